//! sitemaps.org sitemap and sitemap index encoding.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

pub const SITEMAP: &str = "sitemap.xml.gz";
pub const SITEMAP_INDEX: &str = "sitemapindex.xml.gz";

fn lastmod(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y-%m-%d").to_string()
}

/// One `url` per package, pointing at its index page below `base_url`.
pub fn write_sitemap(
    w: &mut dyn Write,
    base_url: &str,
    packages: &BTreeMap<String, SystemTime>,
) -> io::Result<()> {
    writeln!(w, "{XML_HEADER}")?;
    writeln!(w, r#"<urlset xmlns="{SITEMAP_NS}">"#)?;
    for (package, modified) in packages {
        let loc = format!("{base_url}/{package}/index.html");
        writeln!(
            w,
            "  <url><loc>{}</loc><lastmod>{}</lastmod></url>",
            escape(loc.as_str()),
            lastmod(*modified)
        )?;
    }
    writeln!(w, "</urlset>")
}

/// One `sitemap` per suite, pointing at the suite's compressed sitemap.
pub fn write_sitemap_index(
    w: &mut dyn Write,
    base_url: &str,
    suites: &BTreeMap<String, SystemTime>,
) -> io::Result<()> {
    writeln!(w, "{XML_HEADER}")?;
    writeln!(w, r#"<sitemapindex xmlns="{SITEMAP_NS}">"#)?;
    for (suite, modified) in suites {
        let loc = format!("{base_url}/{suite}/{SITEMAP}");
        writeln!(
            w,
            "  <sitemap><loc>{}</loc><lastmod>{}</lastmod></sitemap>",
            escape(loc.as_str()),
            lastmod(*modified)
        )?;
    }
    writeln!(w, "</sitemapindex>")
}

//! HTML pages, built with maud.
//!
//! A manpage page embeds the converter's fragment between two fixed comment
//! markers. A later run that only needs to refresh the surrounding page (for
//! example the list of other versions) extracts the fragment again with
//! [`extract_fragment`] instead of running the converter.

use std::collections::BTreeMap;

use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde_json::json;

use crate::document::Document;

pub const CONTENT_BEGIN: &str = "<!-- manrender:content:begin -->";
pub const CONTENT_END: &str = "<!-- manrender:content:end -->";

/// What goes into the content area of a manpage page.
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    /// HTML fragment produced by the converter (or reused).
    Fragment(&'a str),
    /// The converter rejected the document; the message is shown instead.
    Failed(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub link: String,
    pub text: String,
}

/// schema.org `BreadcrumbList` as JSON-LD, safe to embed in a script element.
pub fn breadcrumbs_json_ld(crumbs: &[Breadcrumb]) -> String {
    let elements: Vec<_> = crumbs
        .iter()
        .enumerate()
        .map(|(idx, crumb)| {
            json!({
                "@type": "ListItem",
                "position": idx + 1,
                "item": {
                    "@type": "Thing",
                    "@id": crumb.link,
                    "name": crumb.text,
                },
            })
        })
        .collect();
    json!({
        "@context": "http://schema.org",
        "@type": "BreadcrumbList",
        "itemListElement": elements,
    })
    .to_string()
    .replace("</", "<\\/")
}

/// The fragment of a page previously rendered by [`manpage_page`].
pub fn extract_fragment(page: &str) -> Option<&str> {
    let start = page.find(CONTENT_BEGIN)? + CONTENT_BEGIN.len();
    let len = page[start..].find(CONTENT_END)?;
    Some(&page[start..start + len])
}

fn layout(title: &str, crumbs: &[Breadcrumb], body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script type="application/ld+json" { (PreEscaped(breadcrumbs_json_ld(crumbs))) }
            }
            body {
                nav.breadcrumbs {
                    @for (idx, crumb) in crumbs.iter().enumerate() {
                        @if idx > 0 { " / " }
                        a href=(crumb.link) { (crumb.text) }
                    }
                }
                (body)
            }
        }
    }
}

fn package_crumbs(base_url: &str, suite: &str, package: &str) -> Vec<Breadcrumb> {
    vec![
        Breadcrumb {
            link: format!("{base_url}/contents-{suite}.html"),
            text: suite.to_string(),
        },
        Breadcrumb {
            link: format!("{base_url}/{suite}/{package}/index.html"),
            text: package.to_string(),
        },
    ]
}

fn page_link(document: &Document) -> String {
    format!("/{}.html", document.serving_path())
}

fn label(document: &Document) -> String {
    match &document.language {
        Some(lang) => format!("{document} [{lang}]"),
        None => document.to_string(),
    }
}

/// Full page for one manpage variant.
pub fn manpage_page(
    base_url: &str,
    document: &Document,
    versions: &[&Document],
    content: Content<'_>,
) -> String {
    let mut crumbs = package_crumbs(base_url, &document.suite, &document.package);
    crumbs.push(Breadcrumb {
        link: format!("{base_url}{}", page_link(document)),
        text: document.to_string(),
    });
    let serving_path = document.serving_path();
    let title = format!("{document} - {} - manpages", document.package);

    let body = html! {
        @if versions.len() > 1 {
            aside.versions {
                h2 { "Other versions" }
                ul {
                    @for version in versions {
                        @if version.serving_path() == serving_path {
                            li.current { (version.suite) " " (label(version)) }
                        } @else {
                            li {
                                a href=(page_link(version)) {
                                    (version.suite) " " (version.package) " " (label(version))
                                }
                            }
                        }
                    }
                }
            }
        }
        main.manpage {
            @match content {
                Content::Fragment(fragment) => {
                    (PreEscaped(CONTENT_BEGIN))
                    (PreEscaped(fragment))
                    (PreEscaped(CONTENT_END))
                }
                Content::Failed(message) => {
                    p.error { "Sorry, this manpage could not be rendered:" }
                    pre.error { (message) }
                }
            }
        }
    };
    layout(&title, &crumbs, body).into_string()
}

/// Index page of one package directory; `documents` is keyed by file name.
pub fn package_index(
    base_url: &str,
    suite: &str,
    package: &str,
    documents: &BTreeMap<String, Document>,
) -> String {
    let crumbs = package_crumbs(base_url, suite, package);
    let title = format!("Manpages of {package} in {suite}");
    let body = html! {
        main.index {
            h1 { (title) }
            ul {
                @for document in documents.values() {
                    li { a href=(format!("{}.html", document.stem())) { (label(document)) } }
                }
            }
        }
    };
    layout(&title, &crumbs, body).into_string()
}

/// List of every package directory of a suite.
pub fn contents_page(base_url: &str, suite: &str, packages: &[String]) -> String {
    let crumbs = vec![Breadcrumb {
        link: format!("{base_url}/contents-{suite}.html"),
        text: suite.to_string(),
    }];
    let title = format!("Contents of {suite}");
    let body = html! {
        main.contents {
            h1 { (title) }
            ul {
                @for package in packages {
                    li { a href=(format!("/{suite}/{package}/index.html")) { (package) } }
                }
            }
        }
    };
    layout(&title, &crumbs, body).into_string()
}

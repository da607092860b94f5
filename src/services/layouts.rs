// src/services/layouts.rs

//! Per-board extraction rules.
//!
//! Every board layout is a flat [`LayoutProfile`]; the only behavior that
//! varies between layouts is the [`LinkRule`] used to rebuild notice URLs.

use crate::error::{AppError, Result};
use crate::models::BoardLayout;

/// How listing rows are split into the pinned and sequential streams.
#[derive(Debug, Clone, Copy)]
pub enum RowPartition {
    /// Separate selectors per stream; boards without pinned rows use `None`
    Selectors {
        pinned: Option<&'static str>,
        sequential: &'static str,
    },
    /// One row selector; rows containing `marker` are pinned
    Marker {
        rows: &'static str,
        marker: &'static str,
    },
}

/// Where a row's title comes from.
#[derive(Debug, Clone, Copy)]
pub enum TextSource {
    /// Element text
    Text(&'static str),
    /// Element attribute, with an optional trailing boilerplate to drop
    Attr {
        selector: &'static str,
        attr: &'static str,
        strip_suffix: Option<&'static str>,
    },
}

impl TextSource {
    pub fn selector(&self) -> &'static str {
        match self {
            TextSource::Text(selector) => selector,
            TextSource::Attr { selector, .. } => selector,
        }
    }
}

/// Where a row's display date comes from.
#[derive(Debug, Clone, Copy)]
pub enum DateSource {
    /// Listing cell holding a `YYYY-MM-DD` style date
    Cell(&'static str),
    /// Board shows no date; the poll date is used
    FetchTime,
}

/// How a row's href is turned into an absolute notice URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRule {
    /// Keep `take` `&`-separated parts of the href starting at `skip` and
    /// append them to the listing URL after `separator`.
    QueryPairs {
        skip: usize,
        take: usize,
        separator: &'static str,
    },
    /// Take the `token`-th space-separated piece of a javascript href as the
    /// article number and swap the listing URL's `list_suffix` for `view_path`.
    ScriptArgument {
        token: usize,
        list_suffix: &'static str,
        view_path: &'static str,
    },
}

impl LinkRule {
    /// Build the notice URL for `href` on the board at `listing_url`.
    pub fn build(&self, listing_url: &str, href: &str) -> Result<String> {
        match *self {
            LinkRule::QueryPairs {
                skip,
                take,
                separator,
            } => {
                let parts: Vec<&str> = href.split('&').filter(|p| !p.is_empty()).collect();
                let kept = parts.get(skip..skip + take).ok_or_else(|| {
                    AppError::parse(
                        "notice link",
                        format!("expected at least {} query parts in '{href}'", skip + take),
                    )
                })?;
                Ok(format!("{listing_url}{separator}{}", kept.join("&")))
            }
            LinkRule::ScriptArgument {
                token,
                list_suffix,
                view_path,
            } => {
                let number = href
                    .split(' ')
                    .filter(|t| !t.is_empty())
                    .nth(token)
                    .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        AppError::parse(
                            "notice link",
                            format!("no article number at token {token} in '{href}'"),
                        )
                    })?;
                let base = listing_url.strip_suffix(list_suffix).ok_or_else(|| {
                    AppError::parse(
                        "notice link",
                        format!("listing URL '{listing_url}' does not end with '{list_suffix}'"),
                    )
                })?;
                Ok(format!("{base}{view_path}{number}"))
            }
        }
    }
}

/// Selectors for the notice's own page.
#[derive(Debug, Clone, Copy)]
pub struct DetailProfile {
    /// Body paragraphs
    pub content: &'static str,

    /// Body images
    pub images: &'static str,

    /// Base for relative image sources; the listing URL when `None`
    pub image_base: Option<&'static str>,

    /// Image hosts that are never notice content
    pub blocked_image_hosts: &'static [&'static str],
}

/// Extraction rules for one board layout.
#[derive(Debug, Clone, Copy)]
pub struct LayoutProfile {
    pub rows: RowPartition,

    /// Selectors that must each match inside the sequential rows; a miss
    /// means the board's markup changed.
    pub anchors: &'static [&'static str],

    /// Pinned rows must be present and match the anchors as well
    pub validate_pinned: bool,

    pub id_cell: &'static str,
    pub category_cell: Option<&'static str>,
    pub title: TextSource,
    pub link_cell: &'static str,
    pub link_rule: LinkRule,
    pub department_cell: Option<&'static str>,
    pub date: DateSource,

    /// `None` for boards whose notices are forwarded without their body
    pub detail: Option<DetailProfile>,

    /// Whether pinned notices are enriched as well
    pub enrich_pinned: bool,
}

const FONT_HOSTS: &[&str] = &["fonts.gstatic.com", "fonts.googleapis.com"];

/// Suffix the Ajou CMS appends to link titles ("read more").
const CMS_TITLE_SUFFIX: &str = " 자세히 보기";

static AJOU_NORMAL: LayoutProfile = LayoutProfile {
    rows: RowPartition::Selectors {
        pinned: Some(
            "#cms-content > div > div > div.bn-list-common02.type01.bn-common-cate > table > tbody > tr[class$=\"b-top-box\"]",
        ),
        sequential: "#cms-content > div > div > div.bn-list-common02.type01.bn-common-cate > table > tbody > tr:not([class$=\"b-top-box\"])",
    },
    anchors: &[
        "td:nth-child(1)",
        "td:nth-child(3) > div > a",
        "td:nth-child(6)",
    ],
    validate_pinned: false,
    id_cell: "td:nth-child(1)",
    category_cell: Some("td:nth-child(2)"),
    title: TextSource::Attr {
        selector: "td:nth-child(3) > div > a",
        attr: "title",
        strip_suffix: Some(CMS_TITLE_SUFFIX),
    },
    link_cell: "td:nth-child(3) > div > a",
    link_rule: LinkRule::QueryPairs {
        skip: 0,
        take: 2,
        separator: "",
    },
    department_cell: Some("td:nth-child(5)"),
    date: DateSource::Cell("td:nth-child(6)"),
    detail: None,
    enrich_pinned: false,
};

static SOFTWARE_BOARD: LayoutProfile = LayoutProfile {
    rows: RowPartition::Marker {
        rows: "#sub_contents > div > div.conbody > table:nth-child(2) > tbody > tr:nth-child(n+4):nth-last-child(n+3):nth-of-type(2n)",
        marker: "td:first-child img",
    },
    anchors: &["td:nth-child(1)", "td:nth-child(3) > a"],
    validate_pinned: false,
    id_cell: "td:nth-child(1)",
    category_cell: None,
    title: TextSource::Text("td:nth-child(3) > a"),
    link_cell: "td:nth-child(3) > a",
    link_rule: LinkRule::QueryPairs {
        skip: 1,
        take: 2,
        separator: "&",
    },
    department_cell: Some("td:nth-child(5)"),
    date: DateSource::FetchTime,
    detail: Some(DetailProfile {
        content: "#DivContents p",
        images: "#DivContents img",
        image_base: Some("http://software.ajou.ac.kr"),
        blocked_image_hosts: FONT_HOSTS,
    }),
    enrich_pinned: true,
};

static DATED_BOARD: LayoutProfile = LayoutProfile {
    rows: RowPartition::Marker {
        rows: "#sub_contents > div > div.conbody > table:nth-child(2) > tbody > tr:nth-child(n+4):nth-last-child(n+3):nth-of-type(2n)",
        marker: "td:first-child img",
    },
    anchors: &[
        "td:nth-child(1)",
        "td:nth-child(3) > a",
        "td:nth-child(3) > p:first-of-type",
    ],
    validate_pinned: true,
    id_cell: "td:nth-child(1)",
    category_cell: None,
    title: TextSource::Text("td:nth-child(3) > a"),
    link_cell: "td:nth-child(3) > a",
    link_rule: LinkRule::QueryPairs {
        skip: 1,
        take: 2,
        separator: "&",
    },
    department_cell: None,
    date: DateSource::Cell("td:nth-child(3) > p:first-of-type"),
    detail: None,
    enrich_pinned: false,
};

static SCRIPT_VIEW: LayoutProfile = LayoutProfile {
    rows: RowPartition::Selectors {
        pinned: None,
        sequential: "#contents > article > section > div > div.tb_w > table > tbody > tr",
    },
    anchors: &[
        "td:nth-child(1)",
        "td:nth-child(2)",
        "td:nth-child(3) > a",
        "td:nth-child(3) > a > span",
    ],
    validate_pinned: false,
    id_cell: "td:nth-child(1)",
    category_cell: Some("td:nth-child(2)"),
    title: TextSource::Text("td:nth-child(3) > a > span"),
    link_cell: "td:nth-child(3) > a",
    link_rule: LinkRule::ScriptArgument {
        token: 5,
        list_suffix: "List.do",
        view_path: "View.do?no=",
    },
    department_cell: None,
    date: DateSource::FetchTime,
    detail: Some(DetailProfile {
        content: "#contents > article > section > div > div > dl > dd.board_view_txt > div.txt span",
        images: "#contents > article > section > div > div > dl > dd.board_view_txt > div.txt img",
        image_base: None,
        blocked_image_hosts: FONT_HOSTS,
    }),
    enrich_pinned: true,
};

static AJOU_CMS: LayoutProfile = LayoutProfile {
    rows: RowPartition::Selectors {
        pinned: Some(
            "#cms-content > div > div > div.type01 > table > tbody > tr[class$=\"b-top-box\"]",
        ),
        sequential: "#cms-content > div > div > div.type01 > table > tbody > tr:not([class$=\"b-top-box\"])",
    },
    anchors: &[
        "td:nth-child(1)",
        "td:nth-child(2) > div > a",
        "td:nth-child(4)",
    ],
    validate_pinned: false,
    id_cell: "td:nth-child(1)",
    category_cell: None,
    title: TextSource::Attr {
        selector: "td:nth-child(2) > div > a",
        attr: "title",
        strip_suffix: Some(CMS_TITLE_SUFFIX),
    },
    link_cell: "td:nth-child(2) > div > a",
    link_rule: LinkRule::QueryPairs {
        skip: 0,
        take: 2,
        separator: "",
    },
    department_cell: Some("td:nth-child(4)"),
    date: DateSource::FetchTime,
    detail: Some(DetailProfile {
        content: "#cms-content > div > div > div.bn-view-common01.type01 > div.b-main-box > div.b-content-box p",
        images: "#cms-content > div > div > div.bn-view-common01.type01 > div.b-main-box > div.b-content-box img",
        image_base: Some("https://www.ajou.ac.kr"),
        blocked_image_hosts: FONT_HOSTS,
    }),
    enrich_pinned: true,
};

/// Look up the extraction rules for a layout.
pub fn profile(layout: BoardLayout) -> &'static LayoutProfile {
    match layout {
        BoardLayout::AjouNormal => &AJOU_NORMAL,
        BoardLayout::SoftwareBoard => &SOFTWARE_BOARD,
        BoardLayout::DatedBoard => &DATED_BOARD,
        BoardLayout::ScriptView => &SCRIPT_VIEW,
        BoardLayout::AjouCms => &AJOU_CMS,
    }
}

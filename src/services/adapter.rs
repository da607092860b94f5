// src/services/adapter.rs

//! Site adapter: reads listing and detail pages for one board.
//!
//! Documents are parsed and queried inside synchronous methods only, so no
//! `scraper::Html` ever lives across an `.await`.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    ListingSnapshot, NoticeDetail, NoticeId, NoticeRecord, PINNED_SENTINEL, RawRow, Topic,
    TopicLabel,
};
use crate::services::layouts::{self, DateSource, LayoutProfile, RowPartition, TextSource};
use crate::utils::http::PageFetcher;
use crate::utils::text::{NEWLINE_TOKEN, month_day, normalize_date, normalize_paragraph, normalize_whitespace};
use crate::utils::{is_absolute_http, resolve_url};

/// Compiled row-level selectors.
struct RowSelectors {
    pinned: Option<Selector>,
    sequential: Selector,
    marker: Option<Selector>,
    anchors: Vec<Selector>,
    id: Selector,
    category: Option<Selector>,
    title: Selector,
    link: Selector,
    department: Option<Selector>,
    date: Option<Selector>,
}

struct DetailSelectors {
    content: Selector,
    images: Selector,
    image_base: Url,
    blocked_hosts: &'static [&'static str],
}

/// Extraction strategy for one topic's board.
pub struct SiteAdapter {
    profile: &'static LayoutProfile,
    listing_url: String,
    topic: TopicLabel,
    rows: RowSelectors,
    detail: Option<DetailSelectors>,
}

impl SiteAdapter {
    /// Build the adapter for a topic's configured layout.
    pub fn for_topic(topic: &Topic) -> Result<Self> {
        let profile = layouts::profile(topic.layout);
        let listing = Url::parse(&topic.listing_url)?;

        let (pinned, sequential, marker) = match profile.rows {
            RowPartition::Selectors { pinned, sequential } => (
                pinned.map(parse_selector).transpose()?,
                parse_selector(sequential)?,
                None,
            ),
            RowPartition::Marker { rows, marker } => {
                (None, parse_selector(rows)?, Some(parse_selector(marker)?))
            }
        };

        let rows = RowSelectors {
            pinned,
            sequential,
            marker,
            anchors: profile
                .anchors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_>>()?,
            id: parse_selector(profile.id_cell)?,
            category: profile.category_cell.map(parse_selector).transpose()?,
            title: parse_selector(profile.title.selector())?,
            link: parse_selector(profile.link_cell)?,
            department: profile.department_cell.map(parse_selector).transpose()?,
            date: match profile.date {
                DateSource::Cell(selector) => Some(parse_selector(selector)?),
                DateSource::FetchTime => None,
            },
        };

        let detail = match &profile.detail {
            Some(detail) => Some(DetailSelectors {
                content: parse_selector(detail.content)?,
                images: parse_selector(detail.images)?,
                image_base: match detail.image_base {
                    Some(base) => Url::parse(base)?,
                    None => listing.clone(),
                },
                blocked_hosts: detail.blocked_image_hosts,
            }),
            None => None,
        };

        Ok(Self {
            profile,
            listing_url: topic.listing_url.clone(),
            topic: topic.label(),
            rows,
            detail,
        })
    }

    /// Whether `record` needs its detail page fetched on this board.
    pub fn requires_detail(&self, record: &NoticeRecord) -> bool {
        self.detail.is_some() && (!record.is_pinned() || self.profile.enrich_pinned)
    }

    /// Check that the listing still has the markup this layout expects.
    ///
    /// Returns `false` when there are no sequential rows or any anchor
    /// selector matches nothing inside them. Layouts that validate pinned
    /// rows apply the same check to those.
    pub fn validate_structure(&self, document: &Html) -> bool {
        let sequential: Vec<ElementRef> = self.sequential_rows(document).collect();
        if !self.anchors_match(&sequential) {
            return false;
        }
        if self.profile.validate_pinned {
            let pinned: Vec<ElementRef> = self.pinned_rows(document).collect();
            return self.anchors_match(&pinned);
        }
        true
    }

    fn anchors_match(&self, rows: &[ElementRef]) -> bool {
        !rows.is_empty()
            && self
                .rows
                .anchors
                .iter()
                .all(|anchor| rows.iter().any(|row| row.select(anchor).next().is_some()))
    }

    /// Capture pinned and sequential rows in page order.
    pub fn snapshot(&self, document: &Html) -> ListingSnapshot {
        let mut snapshot = ListingSnapshot::default();

        if let Some(pinned) = &self.rows.pinned {
            snapshot.pinned = document
                .select(pinned)
                .map(|row| self.capture_row(row, true))
                .collect();
        }

        for row in document.select(&self.rows.sequential) {
            let has_marker = self
                .rows
                .marker
                .as_ref()
                .is_some_and(|marker| row.select(marker).next().is_some());
            let captured = self.capture_row(row, has_marker);
            if has_marker {
                snapshot.pinned.push(captured);
            } else {
                snapshot.sequential.push(captured);
            }
        }

        snapshot
    }

    /// Parse listing markup, validate it and capture its rows.
    pub fn read_listing(&self, markup: &str) -> Result<ListingSnapshot> {
        let document = Html::parse_document(markup);
        if !self.validate_structure(&document) {
            return Err(AppError::StructureChanged {
                topic: self.topic.display_name.clone(),
            });
        }
        Ok(self.snapshot(&document))
    }

    /// Turn one captured row into a listing-level notice record.
    ///
    /// `today` stamps boards that show no date.
    pub fn extract_listing_row(&self, row: &RawRow, today: NaiveDate) -> Result<NoticeRecord> {
        let id = if row.has_marker {
            NoticeId::Pinned
        } else {
            parse_notice_id(row.id_text.as_deref())?
        };

        let title = row
            .title
            .as_deref()
            .map(|raw| self.clean_title(raw))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::parse("notice title", format!("row {id} has no title")))?;

        let href = row
            .href
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::parse("notice link", format!("row {id} has no href")))?;
        let url = self.profile.link_rule.build(&self.listing_url, href)?;
        if !is_absolute_http(&url) {
            return Err(AppError::parse(
                "notice link",
                format!("'{url}' is not absolute"),
            ));
        }

        let date = match self.profile.date {
            DateSource::Cell(_) => {
                let raw = row.date.as_deref().ok_or_else(|| {
                    AppError::parse("notice date", format!("row {id} has no date"))
                })?;
                normalize_date(raw)?
            }
            DateSource::FetchTime => month_day(today),
        };

        Ok(NoticeRecord {
            id,
            category: non_empty(row.category.as_deref()),
            title,
            department: non_empty(row.department.as_deref()),
            date,
            url,
            content: None,
            images: Vec::new(),
            topic: self.topic.clone(),
            detail_error: None,
        })
    }

    /// Fetch a notice's own page and extract its body and images.
    pub async fn fetch_detail(&self, fetcher: &dyn PageFetcher, url: &str) -> Result<NoticeDetail> {
        let markup = fetcher.fetch(url).await?;
        self.parse_detail(&markup)
    }

    /// Extract body text and images from detail page markup.
    pub fn parse_detail(&self, markup: &str) -> Result<NoticeDetail> {
        let Some(detail) = &self.detail else {
            return Ok(NoticeDetail::default());
        };
        let document = Html::parse_document(markup);

        let mut matched = false;
        let mut paragraphs = Vec::new();
        for element in document.select(&detail.content) {
            matched = true;
            if let Some(text) = normalize_paragraph(&element.text().collect::<String>()) {
                paragraphs.push(text);
            }
        }

        let images: Vec<String> = document
            .select(&detail.images)
            .filter(|img| !is_tracking_pixel(img))
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| is_content_image(src, detail.blocked_hosts))
            .map(|src| resolve_url(&detail.image_base, src))
            .collect();

        if !matched && images.is_empty() {
            return Err(AppError::parse(
                "notice detail",
                "body selector matched nothing",
            ));
        }

        Ok(NoticeDetail {
            content: paragraphs.join(NEWLINE_TOKEN),
            images,
        })
    }

    fn sequential_rows<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        let marker = self.rows.marker.as_ref();
        document
            .select(&self.rows.sequential)
            .filter(move |row| marker.is_none_or(|m| row.select(m).next().is_none()))
    }

    fn pinned_rows<'a>(&'a self, document: &'a Html) -> Box<dyn Iterator<Item = ElementRef<'a>> + 'a> {
        match (&self.rows.pinned, &self.rows.marker) {
            (Some(pinned), _) => Box::new(document.select(pinned)),
            (None, Some(marker)) => Box::new(
                document
                    .select(&self.rows.sequential)
                    .filter(move |row| row.select(marker).next().is_some()),
            ),
            (None, None) => Box::new(std::iter::empty()),
        }
    }

    fn capture_row(&self, row: ElementRef, has_marker: bool) -> RawRow {
        let title = match self.profile.title {
            TextSource::Text(_) => first_text(row, &self.rows.title),
            TextSource::Attr { attr, .. } => first_attr(row, &self.rows.title, attr),
        };

        RawRow {
            has_marker,
            id_text: first_text(row, &self.rows.id),
            category: self.rows.category.as_ref().and_then(|s| first_text(row, s)),
            title,
            href: first_attr(row, &self.rows.link, "href"),
            department: self.rows.department.as_ref().and_then(|s| first_text(row, s)),
            date: self.rows.date.as_ref().and_then(|s| first_text(row, s)),
        }
    }

    fn clean_title(&self, raw: &str) -> String {
        let title = normalize_whitespace(raw);
        match self.profile.title {
            TextSource::Attr {
                strip_suffix: Some(suffix),
                ..
            } => title
                .strip_suffix(suffix.trim())
                .map(|t| t.trim_end().to_string())
                .unwrap_or(title),
            _ => title,
        }
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn first_text(row: ElementRef, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|e| normalize_whitespace(&e.text().collect::<String>()))
}

fn first_attr(row: ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    row.select(selector)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_notice_id(text: Option<&str>) -> Result<NoticeId> {
    let text = text
        .map(str::trim)
        .ok_or_else(|| AppError::parse("notice id", "row has no id cell"))?;
    if text == PINNED_SENTINEL {
        return Ok(NoticeId::Pinned);
    }
    text.parse()
        .map(NoticeId::Number)
        .map_err(|e| AppError::parse("notice id", format!("'{text}' is not a number: {e}")))
}

fn is_tracking_pixel(img: &ElementRef) -> bool {
    let value = img.value();
    value.attr("width").map(str::trim) == Some("1") && value.attr("height").map(str::trim) == Some("1")
}

fn is_content_image(src: &str, blocked_hosts: &[&str]) -> bool {
    !src.is_empty()
        && !src.starts_with("data:")
        && !src.contains("base64,")
        && !blocked_hosts.iter().any(|host| src.contains(host))
}

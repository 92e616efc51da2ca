//! Seed URL generation
//!
//! A seed path is a listing URL template such as
//! `d/toronto/all-events/?page={page}&start_date={start_date}&end_date={end_date}`.
//! [`SeedUrls`] expands every template over pages `1..=max_pages_per_seed`
//! and resolves the results against the site base URL.

use crate::config::SiteConfig;
use crate::ConfigError;
use chrono::{Days, Local, NaiveDate};
use url::Url;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Page,
    StartDate,
    EndDate,
}

/// A parsed seed path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl SeedTemplate {
    /// Parses a template, rejecting unknown placeholders, unbalanced braces
    /// and templates without a `{page}` placeholder
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => break,
                            _ => name.push(c),
                        }
                    }

                    if !closed {
                        return Err(ConfigError::InvalidTemplate(format!(
                            "unbalanced '{{' in '{}'",
                            raw
                        )));
                    }

                    let segment = match name.as_str() {
                        "page" => Segment::Page,
                        "start_date" => Segment::StartDate,
                        "end_date" => Segment::EndDate,
                        other => {
                            return Err(ConfigError::InvalidTemplate(format!(
                                "unknown placeholder '{{{}}}' in '{}'",
                                other, raw
                            )))
                        }
                    };

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => {
                    return Err(ConfigError::InvalidTemplate(format!(
                        "unbalanced '}}' in '{}'",
                        raw
                    )))
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.contains(&Segment::Page) {
            return Err(ConfigError::InvalidTemplate(format!(
                "'{}' has no {{page}} placeholder",
                raw
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Substitutes the page number and date window
    pub fn render(&self, page: u32, window: &DateWindow) -> String {
        let mut out = String::with_capacity(self.raw.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Page => out.push_str(&page.to_string()),
                Segment::StartDate => out.push_str(&window.start_param()),
                Segment::EndDate => out.push_str(&window.end_param()),
            }
        }
        out
    }

    /// The template as written in the configuration
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// The rolling date range substituted into seed templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `days` days starting at `start`
    ///
    /// Fails when the end date falls outside the calendar range.
    pub fn new(start: NaiveDate, days: u32) -> Result<Self, ConfigError> {
        let end = start
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "window-days {} from {} is out of range",
                    days, start
                ))
            })?;

        Ok(Self { start, end })
    }

    /// Window of `days` days starting today (local time)
    pub fn starting_today(days: u32) -> Result<Self, ConfigError> {
        Self::new(Local::now().date_naive(), days)
    }

    pub fn start_param(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

/// A concrete listing page to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Position of the seed template in the configuration
    pub seed_index: usize,

    /// Page number, starting at 1
    pub page: u32,

    pub url: Url,
}

/// The bounded, restartable sequence of listing pages for one run
#[derive(Debug, Clone)]
pub struct SeedUrls {
    base: Url,
    templates: Vec<SeedTemplate>,
    max_pages_per_seed: u32,
    window: DateWindow,
}

impl SeedUrls {
    /// Creates the generator, checking that every template resolves against
    /// `base`
    pub fn new(
        base: Url,
        templates: Vec<SeedTemplate>,
        max_pages_per_seed: u32,
        window: DateWindow,
    ) -> Result<Self, ConfigError> {
        for template in &templates {
            base.join(&template.render(1, &window)).map_err(|e| {
                ConfigError::InvalidTemplate(format!(
                    "'{}' does not resolve against {}: {}",
                    template.as_str(),
                    base,
                    e
                ))
            })?;
        }

        Ok(Self {
            base,
            templates,
            max_pages_per_seed,
            window,
        })
    }

    /// Builds the generator from the `[site]` section
    pub fn from_config(site: &SiteConfig, window: DateWindow) -> Result<Self, ConfigError> {
        let base = Url::parse(&site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", site.base_url, e)))?;
        let templates = site
            .seed_paths
            .iter()
            .map(|path| SeedTemplate::parse(path))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(base, templates, site.max_pages_per_seed, window)
    }

    /// Iterates all page requests, every page of seed 1 before seed 2
    ///
    /// Each call starts a fresh pass from the first seed.
    pub fn iter(&self) -> impl Iterator<Item = PageRequest> + '_ {
        self.templates
            .iter()
            .enumerate()
            .flat_map(move |(seed_index, template)| {
                (1..=self.max_pages_per_seed).map(move |page| (seed_index, template, page))
            })
            .filter_map(move |(seed_index, template, page)| {
                self.page_request(seed_index, template, page)
            })
    }

    /// Total number of page requests in one pass
    pub fn len(&self) -> usize {
        self.templates.len() * self.max_pages_per_seed as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    pub fn templates(&self) -> &[SeedTemplate] {
        &self.templates
    }

    /// First page of the first seed
    pub fn sample_url(&self) -> Option<Url> {
        self.iter().next().map(|request| request.url)
    }

    fn page_request(
        &self,
        seed_index: usize,
        template: &SeedTemplate,
        page: u32,
    ) -> Option<PageRequest> {
        match self.base.join(&template.render(page, &self.window)) {
            Ok(url) => Some(PageRequest {
                seed_index,
                page,
                url,
            }),
            Err(e) => {
                tracing::warn!(
                    "Skipping page {} of '{}': {}",
                    page,
                    template.as_str(),
                    e
                );
                None
            }
        }
    }
}

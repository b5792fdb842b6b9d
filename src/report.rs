//! Inspection report assembly.
//!
//! [`ReportBuilder::prepare`] computes everything that ends up on the pages
//! (text lines, warranty window, photo layout) without touching fonts or PDF
//! state.  [`ReportBuilder::render`] then draws the prepared report with
//! `genpdf` and returns the finished bytes.  Nothing here persists or uploads
//! the result.

use std::fmt;

use chrono::{Local, NaiveDate, NaiveDateTime};
use genpdf::elements::PageBreak;
use genpdf::error::Error;
use genpdf::fonts::{FontData, FontFamily};
use genpdf::Size;
use log::{info, warn};

use crate::builder::DocumentBuilder;
use crate::elements::{
    decode_image_from_bytes, mm_from_f64, prepare_for_embedding, ContactFooter, PhotoPages,
    SummaryLine, SummaryPage, Tone,
};
use crate::fetch::ImageFetcher;
use crate::fonts;
use crate::labels::{ordered_images, LabeledImage};
use crate::layout::{ImageReport, LayoutError, PageGeometry, Paginator, PhotoLayout};
use crate::record::{InspectionRecord, ProductClass};
use crate::warranty::{coverage_window, resolve_document_date, WarrantyWindow};

/// Title printed on the first page and stored in the PDF metadata.
pub const REPORT_TITLE: &str = "Gear Motor QC Inspection Report";

const DISPLAY_DATE_FORMAT: &str = "%d-%m-%Y";
const PLACEHOLDER: &str = "-";

/// Completeness-check answers that mean the check failed.
const FAILED_CHECK_VALUES: &[&str] = &["ไม่ถูกต้อง", "incomplete", "incorrect", "failed", "fail", "no"];

/// Errors that can occur while rendering a report.
#[derive(Debug)]
pub enum ReportError {
    /// The report fonts could not be loaded.
    FontLoad(Error),
    /// The page geometry cannot hold the photo pages.
    Layout(LayoutError),
    /// `genpdf` failed to produce the document.
    Render(Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FontLoad(err) => write!(f, "Failed to load report fonts: {err}"),
            Self::Layout(err) => write!(f, "Failed to lay out photo pages: {err}"),
            Self::Render(err) => write!(f, "Failed to render report: {err}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FontLoad(err) | Self::Render(err) => Some(err),
            Self::Layout(err) => Some(err),
        }
    }
}

impl From<LayoutError> for ReportError {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

/// Ready-to-draw resources supplied by the caller.
pub struct ReportAssets {
    fonts: FontFamily<FontData>,
    logo: Option<Vec<u8>>,
    badge: Option<Vec<u8>>,
}

impl ReportAssets {
    /// Creates assets with the given font family and no images.
    pub fn new(fonts: FontFamily<FontData>) -> Self {
        Self {
            fonts,
            logo: None,
            badge: None,
        }
    }

    /// Creates assets with the discovered report fonts.
    ///
    /// See [`crate::fonts`] for the search order.
    pub fn load_default() -> Result<Self, ReportError> {
        fonts::load_font_family()
            .map(Self::new)
            .map_err(ReportError::FontLoad)
    }

    /// Sets the header logo drawn at the top right of every page.
    pub fn with_logo(mut self, logo: impl Into<Option<Vec<u8>>>) -> Self {
        self.logo = logo.into();
        self
    }

    /// Sets the "passed" badge drawn on the first page.
    pub fn with_badge(mut self, badge: impl Into<Option<Vec<u8>>>) -> Self {
        self.badge = badge.into();
        self
    }
}

/// Contact lines printed in the footer of every page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactLines {
    pub service: String,
    pub sales: String,
}

impl Default for ContactLines {
    fn default() -> Self {
        Self {
            service: "SAS Service: 081-9216225".to_owned(),
            sales: "SAS Sales: 081-9216225".to_owned(),
        }
    }
}

/// Everything that ends up on the pages of one report.
pub struct PreparedReport {
    lines: Vec<SummaryLine>,
    warranty: Option<WarrantyWindow>,
    images: Vec<LabeledImage>,
    layout: PhotoLayout,
    decoded: Vec<Option<image::DynamicImage>>,
}

impl PreparedReport {
    /// Text lines of the first page, in drawing order.
    pub fn lines(&self) -> &[SummaryLine] {
        &self.lines
    }

    /// Coverage window shown on the first page, if the term is supported.
    pub fn warranty(&self) -> Option<&WarrantyWindow> {
        self.warranty.as_ref()
    }

    /// Photos in document order with their captions.
    pub fn images(&self) -> &[LabeledImage] {
        &self.images
    }

    /// Photo page layout and the per-photo outcomes.
    pub fn layout(&self) -> &PhotoLayout {
        &self.layout
    }

    /// Total number of pages: the summary page plus the photo pages.
    pub fn page_count(&self) -> usize {
        1 + self.layout.pages().len()
    }
}

/// A finished report.
pub struct RenderedDocument {
    /// PDF bytes ready to download, upload or attach.
    pub bytes: Vec<u8>,
    /// Number of pages in the document.
    pub page_count: usize,
    /// What happened to each photo, in document order.
    pub images: Vec<ImageReport>,
}

/// Renders inspection records into PDF reports.
pub struct ReportBuilder<'a> {
    assets: &'a ReportAssets,
    fetcher: &'a dyn ImageFetcher,
    geometry: PageGeometry,
    labels: Vec<String>,
    contacts: ContactLines,
    today: Option<NaiveDate>,
    generated_at: Option<NaiveDateTime>,
}

impl<'a> ReportBuilder<'a> {
    /// Creates a builder drawing with `assets` and loading photos through `fetcher`.
    pub fn new(assets: &'a ReportAssets, fetcher: &'a dyn ImageFetcher) -> Self {
        Self {
            assets,
            fetcher,
            geometry: PageGeometry::a4(),
            labels: Vec::new(),
            contacts: ContactLines::default(),
            today: None,
            generated_at: None,
        }
    }

    /// Overrides the A4 page geometry.
    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Sets explicit photo captions by position in document order.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the footer contact lines.
    pub fn with_contacts(mut self, contacts: ContactLines) -> Self {
        self.contacts = contacts;
        self
    }

    /// Fixes the date used when a record's document date is missing or malformed.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Fixes the timestamp printed as the generation time.
    pub fn with_generated_at(mut self, generated_at: NaiveDateTime) -> Self {
        self.generated_at = Some(generated_at);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn generated_at(&self) -> NaiveDateTime {
        self.generated_at.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Computes the page content for `record` and loads its photos.
    pub fn prepare(&self, record: &InspectionRecord) -> Result<PreparedReport, LayoutError> {
        let paginator = Paginator::new(self.geometry)?;
        let today = self.today();
        let warranty_text = record.warranty_text();
        let warranty = coverage_window(record.date.as_deref(), warranty_text.as_deref(), today);
        let lines = summary_lines(record, warranty.as_ref(), today, self.generated_at());

        let images = ordered_images(record, &self.labels);
        let (layout, decoded) = paginator.layout_sources(&images, self.fetcher);

        Ok(PreparedReport {
            lines,
            warranty,
            images,
            layout,
            decoded,
        })
    }

    /// Renders `record` into a finished PDF.
    pub fn render(&self, record: &InspectionRecord) -> Result<RenderedDocument, ReportError> {
        let prepared = self.prepare(record)?;
        let page_count = prepared.page_count();
        let PreparedReport {
            lines,
            layout,
            decoded,
            ..
        } = prepared;

        let logo = load_asset("header logo", self.assets.logo.as_deref());
        let badge = load_asset("passed badge", self.assets.badge.as_deref());

        let contacts = self.contacts.clone();
        let margin = self.geometry.margin();
        let mut document = DocumentBuilder::new()
            .with_paper_size(paper_size(&self.geometry))
            .with_title(REPORT_TITLE)
            .with_footer(mm_from_f64(self.geometry.bottom_margin()), move |_| {
                ContactFooter::new(contacts.service.clone(), contacts.sales.clone(), margin)
            })
            .build(self.assets.fonts.clone());

        document.push(SummaryPage::new(lines, logo.clone(), badge, self.geometry));

        let images = layout.reports().to_vec();
        if !layout.pages().is_empty() {
            let embedded = decoded
                .iter()
                .map(|image| image.as_ref().map(prepare_for_embedding))
                .collect();
            document.push(PageBreak::new());
            document.push(PhotoPages::new(
                layout.pages().to_vec(),
                embedded,
                logo,
                self.geometry,
            ));
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes).map_err(ReportError::Render)?;

        let placed = images.iter().filter(|report| report.is_placed()).count();
        info!(
            "Rendered {} ({} pages, {}/{} photos, {} bytes)",
            record
                .serial
                .as_ref()
                .map(|serial| serial.as_str())
                .unwrap_or("unsaved record"),
            page_count,
            placed,
            images.len(),
            bytes.len()
        );

        Ok(RenderedDocument {
            bytes,
            page_count,
            images,
        })
    }
}

/// Paper size matching the page geometry the photo layout was computed for.
fn paper_size(geometry: &PageGeometry) -> Size {
    Size::new(
        mm_from_f64(geometry.page_width()),
        mm_from_f64(geometry.page_height()),
    )
}

/// Whether a completeness-check answer records a failed check.
pub fn check_failed(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    FAILED_CHECK_VALUES.iter().any(|value| answer == *value)
}

fn load_asset(name: &str, bytes: Option<&[u8]>) -> Option<image::DynamicImage> {
    let bytes = bytes?;
    match decode_image_from_bytes(bytes) {
        Ok(image) => Some(prepare_for_embedding(&image)),
        Err(err) => {
            warn!("Skipping {}: {}", name, err);
            None
        }
    }
}

fn field(value: Option<&str>) -> &str {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(PLACEHOLDER)
}

/// Builds the first-page text lines for `record`.
///
/// The generated-at line is the only one that depends on the current time.
pub fn summary_lines(
    record: &InspectionRecord,
    warranty: Option<&WarrantyWindow>,
    today: NaiveDate,
    generated_at: NaiveDateTime,
) -> Vec<SummaryLine> {
    let class = record.product_class();
    let document_date = resolve_document_date(record.date.as_deref(), today);
    let mut lines = vec![
        SummaryLine::new(REPORT_TITLE, Tone::Title),
        SummaryLine::normal(format!(
            "Serial Number: {}",
            record
                .serial
                .as_ref()
                .map(|serial| serial.as_str())
                .unwrap_or(PLACEHOLDER)
        )),
        SummaryLine::normal(format!(
            "Inspection date: {}",
            document_date.format(DISPLAY_DATE_FORMAT)
        )),
        SummaryLine::normal(format!(
            "Product type: {}",
            field(record.product_type.as_deref())
        )),
        SummaryLine::normal(format!(
            "Nameplate: {}",
            field(record.motor_nameplate.as_deref())
        )),
    ];

    if class == ProductClass::Servo {
        lines.push(SummaryLine::alert("** Gear oil not filled"));
    }
    lines.push(SummaryLine::blank());

    if let Some(current) = non_empty(record.motor_current.as_deref()) {
        lines.push(SummaryLine::normal(format!("Motor current: {current} A")));
    }
    if let Some(ratio) = non_empty(record.gear_ratio.as_deref()) {
        lines.push(SummaryLine::normal(format!("Gear ratio: {ratio}")));
    }
    if let Some(sound) = non_empty(record.gear_sound.as_deref()) {
        lines.push(SummaryLine::normal(format!("Gear sound level: {sound} dB")));
    }

    if class.shows_oil_fields() {
        lines.push(SummaryLine::normal(format!(
            "Gear oil type: {}",
            field(record.oil_type.as_deref())
        )));
        lines.push(SummaryLine::normal(format!(
            "Gear oil volume: {} L",
            field(record.oil_liters.as_deref())
        )));
        let filled = match record.oil_filled {
            Some(true) => "Filled",
            Some(false) => "Not filled",
            None => PLACEHOLDER,
        };
        lines.push(SummaryLine::normal(format!("Oil fill status: {filled}")));
    } else if class == ProductClass::NoOilRequired {
        lines.push(SummaryLine::alert("* Gear oil filling not required"));
    }

    if let Some(check) = non_empty(record.check_complete.as_deref()) {
        lines.push(SummaryLine::normal(format!("Completeness check: {check}")));
        if check_failed(check) {
            lines.push(SummaryLine::normal(format!(
                "Reason: {}",
                field(record.incomplete_reason.as_deref())
            )));
        }
    }

    let term = match warranty {
        Some(window) => window.term().to_string(),
        None => {
            let raw = record.warranty_text();
            let raw = field(raw.as_deref());
            if raw.parse::<u32>().is_ok() {
                format!("{raw} months")
            } else {
                raw.to_owned()
            }
        }
    };
    lines.push(SummaryLine::alert(format!("Warranty period: {term}")));
    if let Some(window) = warranty {
        lines.push(SummaryLine::normal(format!(
            "Warranty start: {}",
            window.start().format(DISPLAY_DATE_FORMAT)
        )));
        lines.push(SummaryLine::normal(format!(
            "Warranty valid until: {}",
            window.end().format(DISPLAY_DATE_FORMAT)
        )));
    }
    lines.push(SummaryLine::normal(format!(
        "Inspector: {}",
        field(record.inspector.as_deref())
    )));

    if class == ProductClass::Servo {
        lines.push(SummaryLine::blank());
        lines.push(SummaryLine::alert("** Product warranty 18 months"));
    }

    lines.push(SummaryLine::blank());
    lines.push(SummaryLine::normal(format!(
        "Generated: {}",
        generated_at.format("%d-%m-%Y %H:%M:%S")
    )));

    lines
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

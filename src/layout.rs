//! Page assignment and geometry for inspection photos.
//!
//! The paginator only computes where things go.  All values are millimetres in
//! PDF page coordinates: the origin is the bottom-left corner of the page and
//! the cursor `y_top` moves downwards as photos are placed.

use std::fmt;

use image::GenericImageView;
use log::warn;

use crate::elements::decode_image_from_bytes;
use crate::fetch::ImageFetcher;
use crate::labels::LabeledImage;

/// Nominal height-to-width ratio used by the page-break pre-check.
pub const BREAK_FACTOR: f64 = 4.0 / 3.0;

/// Page geometry consumed by the [`Paginator`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    page_width: f64,
    page_height: f64,
    margin: f64,
    content_top: f64,
    bottom_margin: f64,
    max_image_width: f64,
    label_height: f64,
    gap: f64,
    skip_penalty: f64,
}

impl PageGeometry {
    /// A4 portrait with a 20 mm margin, a 35 mm footer band and 80 mm photos.
    pub fn a4() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin: 20.0,
            content_top: 41.0,
            bottom_margin: 35.0,
            max_image_width: 80.0,
            label_height: 7.0,
            gap: 3.5,
            skip_penalty: 3.5,
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, width: f64, height: f64) -> Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    /// Sets the left/right (and top) margin.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Sets the distance from the top edge to the first caption of a page.
    pub fn with_content_top(mut self, content_top: f64) -> Self {
        self.content_top = content_top;
        self
    }

    /// Sets the band kept free above the bottom edge.
    pub fn with_bottom_margin(mut self, bottom_margin: f64) -> Self {
        self.bottom_margin = bottom_margin;
        self
    }

    /// Sets the configured maximum photo width.
    pub fn with_max_image_width(mut self, max_image_width: f64) -> Self {
        self.max_image_width = max_image_width;
        self
    }

    /// Sets the height reserved for a caption line.
    pub fn with_label_height(mut self, label_height: f64) -> Self {
        self.label_height = label_height;
        self
    }

    /// Sets the space left below each photo.
    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    /// Sets how far the cursor advances for a photo that could not be loaded.
    pub fn with_skip_penalty(mut self, skip_penalty: f64) -> Self {
        self.skip_penalty = skip_penalty;
        self
    }

    /// Page width in millimetres.
    pub fn page_width(&self) -> f64 {
        self.page_width
    }

    /// Page height in millimetres.
    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    /// Left, right and top margin in millimetres.
    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Height of the band kept free for the footer.
    pub fn bottom_margin(&self) -> f64 {
        self.bottom_margin
    }

    /// Vertical space taken by a photo caption.
    pub fn label_height(&self) -> f64 {
        self.label_height
    }

    /// Effective photo width: the configured maximum bounded by the margins.
    pub fn image_width(&self) -> f64 {
        self.max_image_width
            .min(self.page_width - 2.0 * self.margin)
    }

    /// Cursor position at the top of every photo page.
    pub fn content_start(&self) -> f64 {
        self.page_height - self.content_top
    }

    fn validate(&self) -> Result<(), LayoutError> {
        let width = self.image_width();
        if !(width > 0.0) || !(self.label_height >= 0.0) || !(self.gap >= 0.0) {
            return Err(LayoutError::InvalidGeometry(format!(
                "image width {width:.1} mm, label height {:.1} mm, gap {:.1} mm",
                self.label_height, self.gap
            )));
        }

        let required = self.label_height + width * BREAK_FACTOR;
        let available = self.content_start() - self.bottom_margin;
        if required > available {
            return Err(LayoutError::PageTooSmall {
                required,
                available,
            });
        }

        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

/// Errors raised for geometries that cannot hold a single photo.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Negative or zero dimensions.
    InvalidGeometry(String),
    /// A fresh page cannot hold one caption plus one nominal photo.
    PageTooSmall {
        /// Height needed by one caption and photo, in millimetres.
        required: f64,
        /// Height between the first caption and the bottom margin.
        available: f64,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGeometry(details) => write!(f, "Invalid page geometry: {details}"),
            Self::PageTooSmall {
                required,
                available,
            } => write!(
                f,
                "Page too small for photos: {required:.1} mm required, {available:.1} mm available"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

/// A photo as seen by the paginator: its caption and pixel size, or the reason
/// it could not be loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct PhotoInput {
    label: String,
    pixels: Result<(u32, u32), String>,
}

impl PhotoInput {
    /// A decoded photo of `width` x `height` pixels.
    pub fn loaded(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            pixels: Ok((width, height)),
        }
    }

    /// A photo whose bytes could not be fetched or decoded.
    pub fn failed(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pixels: Err(reason.into()),
        }
    }

    /// Caption of the photo.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn aspect(&self) -> Result<f64, String> {
        match &self.pixels {
            Ok((width, height)) if *width > 0 && *height > 0 => {
                Ok(f64::from(*height) / f64::from(*width))
            }
            Ok((width, height)) => Err(format!("image has no area ({width}x{height} px)")),
            Err(reason) => Err(reason.clone()),
        }
    }
}

/// A single drawing step on a photo page.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawInstruction {
    /// Page heading; `continued` on every page after the first.
    Heading { continued: bool },
    /// Caption line centred on `center_x`, its top edge at `top`.
    Label {
        text: String,
        center_x: f64,
        top: f64,
    },
    /// Photo `index` (position in the input) with its bottom-left corner at `(x, y)`.
    Image {
        index: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

/// Instructions for one photo page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoPage {
    instructions: Vec<DrawInstruction>,
}

impl PhotoPage {
    fn new(continued: bool) -> Self {
        Self {
            instructions: vec![DrawInstruction::Heading { continued }],
        }
    }

    /// Ordered drawing steps.
    pub fn instructions(&self) -> &[DrawInstruction] {
        &self.instructions
    }

    /// Iterates over the photos placed on the page.
    pub fn images(&self) -> impl Iterator<Item = &DrawInstruction> {
        self.instructions
            .iter()
            .filter(|instruction| matches!(instruction, DrawInstruction::Image { .. }))
    }
}

/// Final position and size of a placed photo.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// 1-based photo page.
    pub page: usize,
    /// Left edge in millimetres.
    pub x: f64,
    /// Bottom edge in millimetres from the bottom of the page.
    pub y: f64,
    /// Scaled width in millimetres.
    pub width: f64,
    /// Scaled height in millimetres.
    pub height: f64,
}

/// What happened to one photo.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageOutcome {
    /// The photo was drawn at this placement.
    Placed(Placement),
    /// The photo could not be fetched or decoded and was left out.
    Skipped {
        /// Fetch or decode failure, prefixed with the source location.
        reason: String,
    },
}

/// Outcome of one photo, in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageReport {
    /// Position of the photo in document order.
    pub index: usize,
    /// Caption of the photo.
    pub label: String,
    /// Whether and where the photo was placed.
    pub outcome: ImageOutcome,
}

impl ImageReport {
    /// Whether the photo made it into the document.
    pub fn is_placed(&self) -> bool {
        matches!(self.outcome, ImageOutcome::Placed(_))
    }
}

/// Paginated photo pages plus a per-photo report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoLayout {
    pages: Vec<PhotoPage>,
    reports: Vec<ImageReport>,
}

impl PhotoLayout {
    /// Photo pages in order; empty when there were no photos.
    pub fn pages(&self) -> &[PhotoPage] {
        &self.pages
    }

    /// One report per input photo, in input order.
    pub fn reports(&self) -> &[ImageReport] {
        &self.reports
    }

    /// Number of photos placed on pages.
    pub fn placed_count(&self) -> usize {
        self.reports.iter().filter(|report| report.is_placed()).count()
    }
}

/// Scales a photo with the given height/width ratio to `max_width`, shrinking
/// it proportionally when it would be taller than `available_height`.
pub fn scale_to_fit(aspect: f64, max_width: f64, available_height: f64) -> (f64, f64) {
    let height = max_width * aspect;
    if height > available_height {
        (available_height / aspect, available_height)
    } else {
        (max_width, height)
    }
}

/// Lays photos out across fixed-size pages.
#[derive(Clone, Copy, Debug)]
pub struct Paginator {
    geometry: PageGeometry,
}

impl Paginator {
    /// Creates a paginator, rejecting geometries that cannot hold one photo.
    pub fn new(geometry: PageGeometry) -> Result<Self, LayoutError> {
        geometry.validate()?;
        Ok(Self { geometry })
    }

    /// Geometry the paginator lays photos out on.
    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Computes page breaks and placements for `photos`.
    ///
    /// Returns no pages for an empty input.  Photos that failed to load are
    /// reported as skipped and only advance the cursor by the skip penalty.
    pub fn layout(&self, photos: &[PhotoInput]) -> PhotoLayout {
        let geometry = &self.geometry;
        let mut layout = PhotoLayout::default();
        if photos.is_empty() {
            return layout;
        }

        let max_width = geometry.image_width();
        let center_x = geometry.page_width / 2.0;
        let bottom = geometry.bottom_margin;
        let mut y_top = geometry.content_start();
        let mut page = PhotoPage::new(false);

        for (index, photo) in photos.iter().enumerate() {
            let aspect = match photo.aspect() {
                Ok(aspect) => aspect,
                Err(reason) => {
                    warn!("Skipping photo {} ({}): {}", index + 1, photo.label, reason);
                    y_top -= geometry.skip_penalty;
                    layout.reports.push(ImageReport {
                        index,
                        label: photo.label.clone(),
                        outcome: ImageOutcome::Skipped { reason },
                    });
                    continue;
                }
            };

            if y_top - max_width * BREAK_FACTOR < bottom {
                layout
                    .pages
                    .push(std::mem::replace(&mut page, PhotoPage::new(true)));
                y_top = geometry.content_start();
            }
            let page_number = layout.pages.len() + 1;

            page.instructions.push(DrawInstruction::Label {
                text: photo.label.clone(),
                center_x,
                top: y_top,
            });
            y_top -= geometry.label_height;

            let (width, height) = scale_to_fit(aspect, max_width, y_top - bottom);
            let x = center_x - width / 2.0;
            let y = y_top - height;
            page.instructions.push(DrawInstruction::Image {
                index,
                x,
                y,
                width,
                height,
            });
            y_top = y - geometry.gap;

            layout.reports.push(ImageReport {
                index,
                label: photo.label.clone(),
                outcome: ImageOutcome::Placed(Placement {
                    page: page_number,
                    x,
                    y,
                    width,
                    height,
                }),
            });
        }

        layout.pages.push(page);
        layout
    }

    /// Fetches and decodes every photo through `fetcher`, then lays them out.
    ///
    /// The decoded images are returned in input order (`None` for skipped
    /// photos) so they can be drawn without fetching again.
    pub fn layout_sources(
        &self,
        images: &[LabeledImage],
        fetcher: &dyn ImageFetcher,
    ) -> (PhotoLayout, Vec<Option<image::DynamicImage>>) {
        let mut inputs = Vec::with_capacity(images.len());
        let mut decoded = Vec::with_capacity(images.len());

        for image in images {
            let loaded = fetcher
                .fetch(image.source())
                .map_err(|err| err.to_string())
                .and_then(|bytes| decode_image_from_bytes(bytes).map_err(|err| err.to_string()));

            match loaded {
                Ok(dynamic) => {
                    let (width, height) = dynamic.dimensions();
                    inputs.push(PhotoInput::loaded(image.label(), width, height));
                    decoded.push(Some(dynamic));
                }
                Err(reason) => {
                    inputs.push(PhotoInput::failed(
                        image.label(),
                        format!("{}: {}", image.source(), reason),
                    ));
                    decoded.push(None);
                }
            }
        }

        (self.layout(&inputs), decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator() -> Paginator {
        Paginator::new(PageGeometry::a4()).unwrap()
    }

    fn landscape(label: &str) -> PhotoInput {
        PhotoInput::loaded(label, 400, 300)
    }

    fn portrait(label: &str) -> PhotoInput {
        PhotoInput::loaded(label, 300, 400)
    }

    #[test]
    fn empty_input_produces_no_pages() {
        let layout = paginator().layout(&[]);
        assert!(layout.pages().is_empty());
        assert!(layout.reports().is_empty());
    }

    #[test]
    fn two_landscape_photos_share_a_page() {
        let layout = paginator().layout(&[landscape("a"), landscape("b"), landscape("c")]);
        let pages: Vec<usize> = layout
            .reports()
            .iter()
            .map(|report| match report.outcome {
                ImageOutcome::Placed(placement) => placement.page,
                ImageOutcome::Skipped { .. } => 0,
            })
            .collect();
        assert_eq!(pages, vec![1, 1, 2]);
        assert_eq!(
            layout.pages()[1].instructions()[0],
            DrawInstruction::Heading { continued: true }
        );
    }

    #[test]
    fn first_photo_sits_below_the_heading() {
        let layout = paginator().layout(&[landscape("a")]);
        let instructions = layout.pages()[0].instructions();
        assert_eq!(instructions[0], DrawInstruction::Heading { continued: false });
        assert_eq!(
            instructions[1],
            DrawInstruction::Label {
                text: "a".into(),
                center_x: 105.0,
                top: 256.0,
            }
        );
        match instructions[2] {
            DrawInstruction::Image {
                index,
                x,
                y,
                width,
                height,
            } => {
                assert_eq!(index, 0);
                assert!((width - 80.0).abs() < 1e-9);
                assert!((height - 60.0).abs() < 1e-9);
                assert!((x - 65.0).abs() < 1e-9);
                assert!((y - 189.0).abs() < 1e-9);
            }
            ref other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn tall_photo_shrinks_to_available_height() {
        let layout = paginator().layout(&[PhotoInput::loaded("tall", 100, 400)]);
        let ImageOutcome::Placed(placement) = layout.reports()[0].outcome else {
            panic!("photo should be placed");
        };
        let available = 256.0 - 7.0 - 35.0;
        assert!((placement.height - available).abs() < 1e-9);
        assert!((placement.width / placement.height - 0.25).abs() < 1e-9);
        assert!((placement.y - 35.0).abs() < 1e-9);
    }

    #[test]
    fn scale_to_fit_preserves_portrait_ratio() {
        let (width, height) = scale_to_fit(4.0 / 3.0, 80.0, 90.0);
        assert!((height - 90.0).abs() < 1e-9);
        assert!((width / height - 0.75).abs() < 1e-9);

        let (width, height) = scale_to_fit(4.0 / 3.0, 80.0, 200.0);
        assert!((width - 80.0).abs() < 1e-9);
        assert!((height - 80.0 * 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn failed_photo_only_costs_the_skip_penalty() {
        let layout = paginator().layout(&[
            PhotoInput::failed("broken", "connection reset"),
            landscape("ok"),
        ]);
        assert!(matches!(
            layout.reports()[0].outcome,
            ImageOutcome::Skipped { .. }
        ));
        assert_eq!(
            layout.pages()[0].instructions()[1],
            DrawInstruction::Label {
                text: "ok".into(),
                center_x: 105.0,
                top: 256.0 - 3.5,
            }
        );
        assert_eq!(layout.placed_count(), 1);
    }

    #[test]
    fn zero_sized_image_is_skipped() {
        let layout = paginator().layout(&[PhotoInput::loaded("empty", 0, 10)]);
        assert_eq!(layout.placed_count(), 0);
        assert_eq!(layout.pages().len(), 1);
    }

    #[test]
    fn geometry_must_hold_one_photo() {
        let tiny = PageGeometry::a4().with_page_size(210.0, 150.0);
        assert!(matches!(
            Paginator::new(tiny),
            Err(LayoutError::PageTooSmall { .. })
        ));

        let narrow = PageGeometry::a4().with_page_size(40.0, 297.0);
        assert!(matches!(
            Paginator::new(narrow),
            Err(LayoutError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn image_width_is_bounded_by_margins() {
        let geometry = PageGeometry::a4().with_max_image_width(500.0);
        assert!((geometry.image_width() - 170.0).abs() < 1e-9);
    }
}

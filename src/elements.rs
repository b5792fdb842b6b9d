//! Page elements of the inspection report built on top of `genpdf` primitives.
//!
//! `genpdf` lays elements out in a flowing column.  The report needs fixed
//! positions instead, so each element here draws one whole page at absolute
//! offsets from the top-left corner of the page area.

use image::GenericImageView;

use genpdf::elements::Image;
use genpdf::error::{Context as _, Error};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{render, Element, Mm, Position, RenderResult, Scale, Size};

use crate::layout::{DrawInstruction, PageGeometry, PhotoPage};

const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;

/// Longest edge, in pixels, of photos embedded into the document.
pub const MAX_EMBEDDED_EDGE_PX: u32 = 1600;

const LOGO_WIDTH_MM: f64 = 30.0;
const LOGO_RIGHT_INSET_MM: f64 = 15.0;
const LOGO_TOP_MM: f64 = 8.0;
const BADGE_WIDTH_MM: f64 = 30.0;
const BADGE_TOP_MM: f64 = 50.0;
const TITLE_ADVANCE_MM: f64 = 14.0;
const LINE_ADVANCE_MM: f64 = 7.8;
const FOOTER_RULE_INSET_MM: f64 = 15.0;
const FOOTER_TEXT_BOTTOM_MM: f64 = 10.0;

const TITLE_FONT_SIZE: u8 = 22;
const HEADING_FONT_SIZE: u8 = 18;
const BODY_FONT_SIZE: u8 = 16;
const ALERT_COLOR: Color = Color::Rgb(200, 0, 0);
const RULE_COLOR: Color = Color::Greyscale(128);

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn estimated_image_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * (px_width as f64) / dpi;
    let height_mm = MM_PER_INCH * (px_height as f64) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an image from in-memory bytes using the [`image`] crate with descriptive errors.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<image::DynamicImage, Error> {
    image::load_from_memory(bytes.as_ref()).context("Failed to decode image from provided bytes")
}

/// Downsizes `image` to at most [`MAX_EMBEDDED_EDGE_PX`] on its longest edge
/// and drops the alpha channel, which `genpdf` cannot embed.
pub fn prepare_for_embedding(image: &image::DynamicImage) -> image::DynamicImage {
    let (width, height) = image.dimensions();
    let image = if width.max(height) > MAX_EMBEDDED_EDGE_PX {
        image.thumbnail(MAX_EMBEDDED_EDGE_PX, MAX_EMBEDDED_EDGE_PX)
    } else {
        image.clone()
    };
    image::DynamicImage::ImageRgb8(image.to_rgb8())
}

/// Draws `image` scaled to `width` millimetres with its bottom-left corner at
/// `(x, top)`, both measured from the top-left corner of `area`.
fn draw_image(
    context: &genpdf::Context,
    area: &render::Area<'_>,
    style: Style,
    image: &image::DynamicImage,
    x: f64,
    top: f64,
    width: f64,
) -> Result<(), Error> {
    let natural = mm_to_f64(estimated_image_size(image, DEFAULT_IMAGE_DPI).width);
    if natural <= f64::EPSILON {
        return Ok(());
    }
    let scale = width / natural;

    // genpdf takes the top-left corner and shifts to the image origin itself.
    let mut element = Image::from_dynamic_image(image.clone())?
        .with_position(Position::new(mm_from_f64(x), mm_from_f64(top)))
        .with_scale(Scale::new(scale, scale));
    element.render(context, area.clone(), style)?;
    Ok(())
}

fn text_width(context: &genpdf::Context, text: &str, style: Style) -> f64 {
    mm_to_f64(StyledString::new(text.to_owned(), style).width(&context.font_cache))
}

/// Prints a single line whose top-left corner sits at `(x, top)`.
fn draw_text(
    context: &genpdf::Context,
    area: &render::Area<'_>,
    text: &str,
    x: f64,
    top: f64,
    style: Style,
) -> Result<(), Error> {
    if let Some(mut section) = area.text_section(
        &context.font_cache,
        Position::new(mm_from_f64(x), mm_from_f64(top)),
        style,
    ) {
        section.print_str(text, style)?;
    }
    Ok(())
}

fn draw_centered_text(
    context: &genpdf::Context,
    area: &render::Area<'_>,
    text: &str,
    center_x: f64,
    top: f64,
    style: Style,
) -> Result<(), Error> {
    let x = center_x - text_width(context, text, style) / 2.0;
    draw_text(context, area, text, x.max(0.0), top, style)
}

fn draw_logo(
    context: &genpdf::Context,
    area: &render::Area<'_>,
    style: Style,
    logo: Option<&image::DynamicImage>,
    page_width: f64,
) -> Result<(), Error> {
    if let Some(logo) = logo {
        let x = page_width - LOGO_WIDTH_MM - LOGO_RIGHT_INSET_MM;
        draw_image(context, area, style, logo, x, LOGO_TOP_MM, LOGO_WIDTH_MM)?;
    }
    Ok(())
}

/// Visual weight of a first-page line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    /// Centred document title.
    Title,
    /// Regular field line.
    Normal,
    /// Bold red notice.
    Alert,
    /// Empty spacer line.
    Blank,
}

/// One text line of the first page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryLine {
    text: String,
    tone: Tone,
}

impl SummaryLine {
    /// Creates a line drawn with `tone`.
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    /// Regular body text.
    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Normal)
    }

    /// Bold red notice.
    pub fn alert(text: impl Into<String>) -> Self {
        Self::new(text, Tone::Alert)
    }

    /// Empty line used as vertical spacing.
    pub fn blank() -> Self {
        Self::new(String::new(), Tone::Blank)
    }

    /// Text of the line; empty for blank lines.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// How the line is drawn.
    pub fn tone(&self) -> Tone {
        self.tone
    }
}

/// The fixed-layout first page: logo, title, field lines and the "passed" badge.
pub struct SummaryPage {
    lines: Vec<SummaryLine>,
    logo: Option<image::DynamicImage>,
    badge: Option<image::DynamicImage>,
    geometry: PageGeometry,
}

impl SummaryPage {
    /// Creates the first page; the logo and badge are optional.
    pub fn new(
        lines: Vec<SummaryLine>,
        logo: Option<image::DynamicImage>,
        badge: Option<image::DynamicImage>,
        geometry: PageGeometry,
    ) -> Self {
        Self {
            lines,
            logo,
            badge,
            geometry,
        }
    }
}

impl Element for SummaryPage {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let geometry = &self.geometry;
        draw_logo(context, &area, style, self.logo.as_ref(), geometry.page_width())?;

        let body = style.and(Style::new().with_font_size(BODY_FONT_SIZE));
        let mut top = geometry.margin();
        for line in &self.lines {
            match line.tone {
                Tone::Title => {
                    let title = style.and(Style::new().with_font_size(TITLE_FONT_SIZE).bold());
                    draw_centered_text(
                        context,
                        &area,
                        &line.text,
                        geometry.page_width() / 2.0,
                        top,
                        title,
                    )?;
                    top += TITLE_ADVANCE_MM;
                }
                Tone::Normal => {
                    draw_text(context, &area, &line.text, geometry.margin(), top, body)?;
                    top += LINE_ADVANCE_MM;
                }
                Tone::Alert => {
                    let alert = body.and(Style::new().bold().with_color(ALERT_COLOR));
                    draw_text(context, &area, &line.text, geometry.margin(), top, alert)?;
                    top += LINE_ADVANCE_MM;
                }
                Tone::Blank => top += LINE_ADVANCE_MM,
            }
        }

        if let Some(badge) = &self.badge {
            let x = geometry.page_width() - geometry.margin() - BADGE_WIDTH_MM;
            draw_image(
                context,
                &area,
                style,
                badge,
                x,
                BADGE_TOP_MM,
                BADGE_WIDTH_MM,
            )?;
        }

        let mut result = RenderResult::default();
        let used = top.min(mm_to_f64(area.size().height));
        result.size = Size::new(area.size().width, mm_from_f64(used));
        Ok(result)
    }
}

/// Renders the paginator's photo pages, one page per render call.
pub struct PhotoPages {
    pages: Vec<PhotoPage>,
    images: Vec<Option<image::DynamicImage>>,
    logo: Option<image::DynamicImage>,
    geometry: PageGeometry,
    heading: String,
    continued_heading: String,
    next_page: usize,
}

impl PhotoPages {
    /// Creates the photo pages; `images` is indexed like the layout's photos.
    pub fn new(
        pages: Vec<PhotoPage>,
        images: Vec<Option<image::DynamicImage>>,
        logo: Option<image::DynamicImage>,
        geometry: PageGeometry,
    ) -> Self {
        Self {
            pages,
            images,
            logo,
            geometry,
            heading: "Photographs:".to_owned(),
            continued_heading: "Photographs (continued):".to_owned(),
            next_page: 0,
        }
    }

    fn draw_instruction(
        &self,
        instruction: &DrawInstruction,
        context: &genpdf::Context,
        area: &render::Area<'_>,
        style: Style,
    ) -> Result<(), Error> {
        let page_height = self.geometry.page_height();
        match instruction {
            DrawInstruction::Heading { continued } => {
                let heading = if *continued {
                    &self.continued_heading
                } else {
                    &self.heading
                };
                let heading_style = style.and(Style::new().with_font_size(HEADING_FONT_SIZE).bold());
                draw_text(
                    context,
                    area,
                    heading,
                    self.geometry.margin(),
                    self.geometry.margin(),
                    heading_style,
                )
            }
            DrawInstruction::Label {
                text,
                center_x,
                top,
            } => {
                let label_style = style.and(Style::new().with_font_size(BODY_FONT_SIZE));
                draw_centered_text(context, area, text, *center_x, page_height - top, label_style)
            }
            DrawInstruction::Image {
                index,
                x,
                y,
                width,
                height,
            } => match self.images.get(*index).and_then(Option::as_ref) {
                Some(image) => {
                    let top = page_height - (y + height);
                    draw_image(context, area, style, image, *x, top, *width)
                }
                None => Ok(()),
            },
        }
    }
}

impl Element for PhotoPages {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let Some(page) = self.pages.get(self.next_page) else {
            return Ok(result);
        };

        draw_logo(
            context,
            &area,
            style,
            self.logo.as_ref(),
            self.geometry.page_width(),
        )?;
        for instruction in page.instructions() {
            self.draw_instruction(instruction, context, &area, style)?;
        }

        self.next_page += 1;
        result.size = area.size();
        result.has_more = self.next_page < self.pages.len();
        Ok(result)
    }
}

/// Footer with a grey rule and two contact lines, left and right aligned.
pub struct ContactFooter {
    left: String,
    right: String,
    margin: f64,
}

impl ContactFooter {
    /// Creates a footer whose text is inset by `margin` millimetres.
    pub fn new(left: impl Into<String>, right: impl Into<String>, margin: f64) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            margin,
        }
    }
}

impl Element for ContactFooter {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let width = mm_to_f64(area.size().width);
        let height = mm_to_f64(area.size().height);

        area.draw_line(
            vec![
                Position::new(mm_from_f64(FOOTER_RULE_INSET_MM), Mm::default()),
                Position::new(mm_from_f64(width - FOOTER_RULE_INSET_MM), Mm::default()),
            ],
            Style::new().with_color(RULE_COLOR),
        );

        let text_style = style.and(Style::new().with_font_size(BODY_FONT_SIZE));
        let line_height = mm_to_f64(text_style.line_height(&context.font_cache));
        let top = (height - FOOTER_TEXT_BOTTOM_MM - line_height).max(0.0);

        draw_text(context, &area, &self.left, self.margin, top, text_style)?;
        let right_x = width - self.margin - text_width(context, &self.right, text_style);
        draw_text(context, &area, &self.right, right_x.max(0.0), top, text_style)?;

        let mut result = RenderResult::default();
        result.size = area.size();
        Ok(result)
    }
}

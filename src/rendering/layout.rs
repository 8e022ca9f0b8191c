//! Block layout for composition subtrees
//!
//! Children stack vertically inside their parent's content box. Text runs
//! are wrapped greedily with the font manager's metrics. Elements styled
//! `position: absolute` leave the flow, are placed against the canvas and
//! painted after everything in flow.

use super::images::{decode_data_uri, is_data_uri, ImageStore};
use super::style::{InlineStyle, Length, TextAlign, MAX_LENGTH};
use super::{Composition, CrossOriginPolicy, RenderOptions};
use crate::export::compute_fit_dimensions;
use crate::fonts::FontManager;
use crate::{Error, Result};
use image::{Rgba, RgbaImage};
use scraper::{ElementRef, Node};
use std::collections::HashMap;
use std::sync::Arc;

/// Marks a `<br>` inside a text run; whitespace collapsing keeps it.
const LINE_BREAK: char = '\u{2028}';
const BASE_FONT_SIZE: f32 = 16.0;
const MAX_FONT_SIZE: f32 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    /// A box with a painted background
    Block { background: Rgba<u8> },
    /// An image scaled into `rect`
    Image { url: String },
    /// One wrapped line of text
    Text {
        text: String,
        font_size: f32,
        color: Rgba<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub elem_type: ElementType,
}

/// Layout output: nodes in paint order plus every image they reference.
#[derive(Debug, Default)]
pub struct LayoutTree {
    pub nodes: Vec<LayoutNode>,
    pub images: HashMap<String, Arc<RgbaImage>>,
}

#[derive(Debug, Clone, Copy)]
struct Inherited {
    color: Rgba<u8>,
    font_size: f32,
    align: TextAlign,
}

impl Default for Inherited {
    fn default() -> Self {
        Self {
            color: Rgba([0, 0, 0, 255]),
            font_size: BASE_FONT_SIZE,
            align: TextAlign::Left,
        }
    }
}

struct Layout<'a> {
    composition: &'a Composition,
    store: &'a ImageStore,
    fonts: &'a FontManager,
    options: &'a RenderOptions,
    images: HashMap<String, Arc<RgbaImage>>,
    positioned: Vec<LayoutNode>,
}

/// Lay out `root` and its descendants on a canvas of `options.width` by
/// `options.height` logical pixels.
pub fn layout_subtree(
    root: ElementRef<'_>,
    composition: &Composition,
    store: &ImageStore,
    fonts: &FontManager,
    options: &RenderOptions,
) -> Result<LayoutTree> {
    let style = element_style(root);
    if style.is_hidden() {
        return Ok(LayoutTree::default());
    }

    let mut layout = Layout {
        composition,
        store,
        fonts,
        options,
        images: HashMap::new(),
        positioned: Vec::new(),
    };
    let mut nodes = Vec::new();
    layout.layout_box(root, &style, 0, 0, options.width, Inherited::default(), &mut nodes)?;

    let Layout {
        images, positioned, ..
    } = layout;
    nodes.extend(positioned);
    Ok(LayoutTree { nodes, images })
}

fn element_style(el: ElementRef<'_>) -> InlineStyle {
    el.value()
        .attr("style")
        .map(InlineStyle::parse)
        .unwrap_or_default()
}

fn heading_size(tag: &str) -> Option<f32> {
    match tag {
        "h1" => Some(32.0),
        "h2" => Some(24.0),
        "h3" => Some(20.0),
        "h4" => Some(18.0),
        "h5" => Some(16.0),
        "h6" => Some(14.0),
        _ => None,
    }
}

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "span" | "a" | "b" | "strong" | "em" | "i" | "u" | "small" | "label" | "code" | "mark"
    )
}

fn inherit(el: ElementRef<'_>, style: &InlineStyle, parent: Inherited) -> Inherited {
    let default_size = heading_size(el.value().name()).unwrap_or(parent.font_size);
    let font_size = style
        .length("font-size")
        .map(|len| match len {
            Length::Px(px) => px,
            Length::Percent(pct) => parent.font_size * pct / 100.0,
        })
        .filter(|size| *size > 0.0)
        .map(|size| size.min(MAX_FONT_SIZE))
        .unwrap_or(default_size);
    Inherited {
        color: style.color("color").unwrap_or(parent.color),
        font_size,
        align: style.text_align().unwrap_or(parent.align),
    }
}

/// Canvas offset for a pixel extent, saturating at `i32::MAX`.
fn offset(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// `other * target / this` without overflow; 0 when `this` is 0.
fn proportional(other: u32, target: u32, this: u32) -> u32 {
    if this == 0 {
        0
    } else {
        (other as u64 * target as u64 / this as u64).min(MAX_LENGTH as u64) as u32
    }
}

impl<'a> Layout<'a> {
    fn layout_child(
        &mut self,
        el: ElementRef<'_>,
        x: i32,
        y: i32,
        available: u32,
        parent: Inherited,
        out: &mut Vec<LayoutNode>,
    ) -> Result<u32> {
        let style = element_style(el);
        if style.is_hidden() {
            return Ok(0);
        }
        if style.is_absolute() {
            self.layout_positioned(el, &style, parent)?;
            return Ok(0);
        }
        self.layout_box(el, &style, x, y, available, parent, out)
    }

    /// Lay out one box at (`x`, `y`); returns the height it consumes in
    /// the flow, margins included.
    #[allow(clippy::too_many_arguments)]
    fn layout_box(
        &mut self,
        el: ElementRef<'_>,
        style: &InlineStyle,
        x: i32,
        y: i32,
        available: u32,
        parent: Inherited,
        out: &mut Vec<LayoutNode>,
    ) -> Result<u32> {
        let margin = style.length("margin").map_or(0, |l| l.resolve(available));
        let margins = margin.saturating_mul(2);
        let bx = x.saturating_add(offset(margin));
        let by = y.saturating_add(offset(margin));
        let inner_available = available.saturating_sub(margins);

        if el.value().name() == "img" {
            let height = self.layout_image(el, style, bx, by, inner_available, out)?;
            return Ok(height.saturating_add(margins));
        }

        let inherited = inherit(el, style, parent);
        let width = style
            .length("width")
            .map_or(inner_available, |l| l.resolve(available));
        let explicit_height = style
            .length("height")
            .map(|l| l.resolve(self.options.height));
        let padding = style.length("padding").map_or(0, |l| l.resolve(available));

        let background_index = style.background().map(|background| {
            out.push(LayoutNode {
                rect: Rect {
                    x: bx,
                    y: by,
                    width,
                    height: 0,
                },
                elem_type: ElementType::Block { background },
            });
            out.len() - 1
        });

        let paddings = padding.saturating_mul(2);
        let content_x = bx.saturating_add(offset(padding));
        let content_top = by.saturating_add(offset(padding));
        let content_width = width.saturating_sub(paddings);
        let mut cursor = content_top;
        let mut run = String::new();

        for child in el.children() {
            match child.value() {
                Node::Text(text) => run.push_str(text),
                Node::Element(element) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let tag = element.name();
                    if tag == "br" {
                        run.push(LINE_BREAK);
                        continue;
                    }
                    if is_inline(tag) && !element_style(child_el).is_absolute() {
                        run.extend(child_el.text());
                        continue;
                    }
                    let text_height =
                        self.flush_text(&mut run, content_x, cursor, content_width, inherited, out);
                    cursor = cursor.saturating_add(offset(text_height));
                    let child_height =
                        self.layout_child(child_el, content_x, cursor, content_width, inherited, out)?;
                    cursor = cursor.saturating_add(offset(child_height));
                }
                _ => {}
            }
        }
        let text_height = self.flush_text(&mut run, content_x, cursor, content_width, inherited, out);
        cursor = cursor.saturating_add(offset(text_height));

        let content_height = u32::try_from(cursor.saturating_sub(content_top)).unwrap_or(0);
        let height = explicit_height.unwrap_or(content_height.saturating_add(paddings));
        if let Some(index) = background_index {
            out[index].rect.height = height;
        }
        Ok(height.saturating_add(margins))
    }

    /// Absolutely positioned boxes resolve `left`/`top`/`bottom` against
    /// the canvas.
    fn layout_positioned(
        &mut self,
        el: ElementRef<'_>,
        style: &InlineStyle,
        parent: Inherited,
    ) -> Result<()> {
        let canvas_width = self.options.width;
        let canvas_height = self.options.height;
        let left = style.length("left").map_or(0, |l| l.resolve(canvas_width));
        let top = style.length("top").map(|l| l.resolve(canvas_height));
        let bottom = style.length("bottom").map(|l| l.resolve(canvas_height));

        let mut nodes = Vec::new();
        let available = canvas_width.saturating_sub(left);
        let height = self.layout_box(el, style, offset(left), 0, available, parent, &mut nodes)?;

        let y = match (top, bottom) {
            (Some(top), _) => offset(top),
            (None, Some(bottom)) => offset(canvas_height)
                .saturating_sub(offset(bottom))
                .saturating_sub(offset(height)),
            (None, None) => 0,
        };
        for node in &mut nodes {
            node.rect.y = node.rect.y.saturating_add(y);
        }
        self.positioned.extend(nodes);
        Ok(())
    }

    fn layout_image(
        &mut self,
        el: ElementRef<'_>,
        style: &InlineStyle,
        x: i32,
        y: i32,
        available: u32,
        out: &mut Vec<LayoutNode>,
    ) -> Result<u32> {
        let src = el
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::RenderFailed("<img> element has no src".into()))?;
        let url = self.composition.resolve_url(src);
        let pixels = self.fetch_image(&url)?;
        let (natural_width, natural_height) = pixels.dimensions();

        let width = style
            .length("width")
            .or_else(|| el.value().attr("width").and_then(Length::parse))
            .map(|l| l.resolve(available));
        let height = style
            .length("height")
            .or_else(|| el.value().attr("height").and_then(Length::parse))
            .map(|l| l.resolve(self.options.height));

        let (width, height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, proportional(natural_height, w, natural_width)),
            (None, Some(h)) => (proportional(natural_width, h, natural_height), h),
            (None, None) => {
                compute_fit_dimensions(natural_width, natural_height, available, self.options.height)
            }
        };

        out.push(LayoutNode {
            rect: Rect {
                x,
                y,
                width,
                height,
            },
            elem_type: ElementType::Image { url },
        });
        Ok(height)
    }

    fn fetch_image(&mut self, url: &str) -> Result<Arc<RgbaImage>> {
        if let Some(pixels) = self.images.get(url) {
            return Ok(pixels.clone());
        }
        let pixels = if is_data_uri(url) {
            Arc::new(decode_data_uri(url).map_err(|e| Error::RenderFailed(e.to_string()))?)
        } else {
            self.check_origin(url)?;
            self.store
                .get(url)
                .map(|image| image.pixels.clone())
                .ok_or_else(|| {
                    Error::RenderFailed(format!("image {} was not preloaded", url))
                })?
        };
        self.images.insert(url.to_string(), pixels.clone());
        Ok(pixels)
    }

    fn check_origin(&self, url: &str) -> Result<()> {
        match self.options.cross_origin {
            CrossOriginPolicy::Anonymous => Ok(()),
            CrossOriginPolicy::SameOrigin => {
                let same_origin = match (self.composition.base_url(), url::Url::parse(url)) {
                    (Some(base), Ok(parsed)) => base.origin() == parsed.origin(),
                    _ => false,
                };
                if same_origin {
                    Ok(())
                } else {
                    Err(Error::RenderFailed(format!(
                        "cross-origin image {} is not readable under the same-origin policy",
                        url
                    )))
                }
            }
        }
    }

    /// Wrap and emit the pending text run; returns the height used.
    fn flush_text(
        &self,
        run: &mut String,
        x: i32,
        y: i32,
        width: u32,
        style: Inherited,
        out: &mut Vec<LayoutNode>,
    ) -> u32 {
        let text = std::mem::take(run);
        let size = style.font_size;
        let mut lines = Vec::new();
        for paragraph in text.split(LINE_BREAK) {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if !current.is_empty() && self.fonts.measure(&candidate, size) > width as f32 {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            if !current.is_empty() {
                lines.push(current);
            }
        }
        if lines.is_empty() {
            return 0;
        }

        let line_height = self.fonts.line_height(size).ceil() as u32;
        for (i, line) in lines.iter().enumerate() {
            let line_width = self.fonts.measure(line, size).ceil() as u32;
            let indent = match style.align {
                TextAlign::Left => 0,
                TextAlign::Center => width.saturating_sub(line_width) / 2,
                TextAlign::Right => width.saturating_sub(line_width),
            };
            out.push(LayoutNode {
                rect: Rect {
                    x: x.saturating_add(offset(indent)),
                    y: y.saturating_add(offset((i as u32).saturating_mul(line_height))),
                    width: line_width,
                    height: line_height,
                },
                elem_type: ElementType::Text {
                    text: line.clone(),
                    font_size: size,
                    color: style.color,
                },
            });
        }
        (lines.len() as u32).saturating_mul(line_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::images::LoadedImage;
    use crate::rendering::Target;

    fn lay_out(html: &str, store: &ImageStore) -> Result<LayoutTree> {
        let composition = Composition::parse(html);
        let root = composition.resolve(&Target::Id("card"))?;
        layout_subtree(
            root,
            &composition,
            store,
            &FontManager::empty(),
            &RenderOptions::default(),
        )
    }

    #[test]
    fn stacks_title_and_paragraphs() {
        let html = r#"<div id="card" style="padding: 10px; background: #fff">
            <h1>Heading</h1><p>Hello world</p><p>More text</p></div>"#;
        let tree = lay_out(html, &ImageStore::new()).unwrap();
        assert!(matches!(tree.nodes[0].elem_type, ElementType::Block { .. }));
        let texts: Vec<&LayoutNode> = tree
            .nodes
            .iter()
            .filter(|n| matches!(n.elem_type, ElementType::Text { .. }))
            .collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0].rect.x, 10);
        assert_eq!(texts[0].rect.y, 10);
        // h1 line box is 32px * 1.2, rounded up
        assert_eq!(texts[1].rect.y, 10 + 39);
        assert!(texts[2].rect.y > texts[1].rect.y);
        match &texts[0].elem_type {
            ElementType::Text { font_size, .. } => assert_eq!(*font_size, 32.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn image_without_size_fits_the_canvas_width() {
        let mut store = ImageStore::new();
        store.insert(LoadedImage::new("http://x/big.png", RgbaImage::new(1200, 900)));
        let html = r#"<div id="card"><img src="http://x/big.png"></div>"#;
        let tree = lay_out(html, &store).unwrap();
        let img = &tree.nodes[0];
        assert_eq!(img.rect, Rect { x: 0, y: 0, width: 600, height: 450 });
        assert!(tree.images.contains_key("http://x/big.png"));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let mut store = ImageStore::new();
        store.insert(LoadedImage::new("http://x/s.png", RgbaImage::new(40, 30)));
        let html = r#"<div id="card"><img src="http://x/s.png"></div>"#;
        let tree = lay_out(html, &store).unwrap();
        assert_eq!((tree.nodes[0].rect.width, tree.nodes[0].rect.height), (40, 30));
    }

    #[test]
    fn missing_preload_fails_the_render() {
        let html = r#"<div id="card"><img src="http://x/missing.png"></div>"#;
        let err = lay_out(html, &ImageStore::new()).unwrap_err();
        assert!(matches!(err, Error::RenderFailed(ref m) if m.contains("missing.png")));
    }

    #[test]
    fn absolute_overlay_is_painted_last_at_bottom() {
        let html = r#"<div id="card" style="background:#000">
            <p style="position:absolute; left: 20px; bottom: 40px">Caption</p>
            <div style="height: 100px; background: #f00"></div></div>"#;
        let tree = lay_out(html, &ImageStore::new()).unwrap();
        let last = tree.nodes.last().unwrap();
        assert!(matches!(last.elem_type, ElementType::Text { .. }));
        assert_eq!(last.rect.x, 20);
        // 16px text => 20px line box, placed 40px above the 800px canvas bottom
        assert_eq!(last.rect.y, 800 - 40 - 20);
        // the overlay does not push the flow down
        assert_eq!(tree.nodes[1].rect.y, 0);
    }

    #[test]
    fn hidden_children_and_centered_text() {
        let html = r#"<div id="card" style="text-align:center">
            <p style="display:none">gone</p><p>abcd</p></div>"#;
        let tree = lay_out(html, &ImageStore::new()).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        // "abcd" is estimated at 32px wide on a 600px line
        assert_eq!(tree.nodes[0].rect.x, (600 - 32) / 2);
    }

    #[test]
    fn huge_lengths_saturate_instead_of_overflowing() {
        for style in [
            "margin: 3000000000px",
            "padding: 3000000000px",
            "margin: 1e30%; padding: 1e30%",
            "height: 3000000000px; font-size: 1e9px",
        ] {
            let html = format!(
                r#"<div id="card"><div style="{style}">x</div><div style="height: 4000000px"></div>
                   <p style="position: absolute; bottom: 3000000000px; left: 3000000000px">y</p></div>"#
            );
            let tree = lay_out(&html, &ImageStore::new()).unwrap();
            for node in &tree.nodes {
                assert!(node.rect.width <= MAX_LENGTH, "{style}: {:?}", node.rect);
            }
        }
    }

    #[test]
    fn long_text_wraps() {
        let html = r#"<div id="card" style="width: 100px">one two three four five six</div>"#;
        let tree = lay_out(html, &ImageStore::new()).unwrap();
        assert!(tree.nodes.len() > 1);
        assert!(tree.nodes.iter().all(|n| n.rect.width <= 100));
    }
}

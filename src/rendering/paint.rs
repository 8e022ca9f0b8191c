//! Display list built from laid-out nodes

use super::layout::{ElementType, LayoutNode};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
    Image {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        url: String,
    },
    Text {
        x: i32,
        y: i32,
        size: f32,
        rgba: (u8, u8, u8, u8),
        text: String,
    },
}

/// Translate layout nodes into paint commands, dropping anything that
/// would not change a pixel.
pub fn build_display_list(nodes: &[LayoutNode]) -> Vec<PaintCommand> {
    nodes
        .iter()
        .filter(|node| node.rect.width > 0 && node.rect.height > 0)
        .filter_map(|node| {
            let r = node.rect;
            match &node.elem_type {
                ElementType::Block { background } if background[3] > 0 => {
                    Some(PaintCommand::SolidRect {
                        x: r.x,
                        y: r.y,
                        width: r.width,
                        height: r.height,
                        rgba: (background[0], background[1], background[2], background[3]),
                    })
                }
                ElementType::Block { .. } => None,
                ElementType::Image { url } => Some(PaintCommand::Image {
                    x: r.x,
                    y: r.y,
                    width: r.width,
                    height: r.height,
                    url: url.clone(),
                }),
                ElementType::Text {
                    text,
                    font_size,
                    color,
                } if color[3] > 0 => Some(PaintCommand::Text {
                    x: r.x,
                    y: r.y,
                    size: *font_size,
                    rgba: (color[0], color[1], color[2], color[3]),
                    text: text.clone(),
                }),
                ElementType::Text { .. } => None,
            }
        })
        .collect()
}

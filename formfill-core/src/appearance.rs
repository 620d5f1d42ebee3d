//! Appearance streams for filled widgets (ISO 32000-1 §12.7.3.3)

use crate::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream, StringFormat};

/// Font resource name used when the form does not provide one.
pub const DEFAULT_FONT: &str = "Helv";
const DEFAULT_FONT_SIZE: f32 = 12.0;
const MIN_AUTO_FONT_SIZE: f32 = 4.0;
const MAX_AUTO_FONT_SIZE: f32 = 12.0;
/// Inset between the widget border and its text.
const PADDING: f32 = 2.0;
const LINE_SPACING: f32 = 1.15;

/// Multiline flag (bit 13)
pub const FLAG_MULTILINE: i64 = 1 << 12;
/// Comb flag (bit 25)
pub const FLAG_COMB: i64 = 1 << 24;

/// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
    722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722,
    667, 944, 667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
    556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500,
    500, 334, 260, 334, 584,
];

/// Width of `text` set in Helvetica at `size`, in points.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E => HELVETICA_WIDTHS[(code - 0x20) as usize] as u32,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Horizontal alignment (`/Q`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quadding {
    #[default]
    Left,
    Center,
    Right,
}

impl Quadding {
    pub fn from_pdf(value: i64) -> Self {
        match value {
            1 => Quadding::Center,
            2 => Quadding::Right,
            _ => Quadding::Left,
        }
    }
}

/// Parsed default appearance string (`/DA`), e.g. `/Helv 0 Tf 0 g`
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultAppearance {
    pub font: String,
    /// 0 means auto-size
    pub size: f32,
    /// Colour operator with its operands, e.g. `("rg", [1, 0, 0])`
    pub color: (String, Vec<f32>),
}

impl Default for DefaultAppearance {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            size: 0.0,
            color: ("g".to_string(), vec![0.0]),
        }
    }
}

impl DefaultAppearance {
    /// Parse a DA string. Unknown operators are ignored; missing parts keep
    /// their defaults.
    pub fn parse(da: &str) -> Self {
        let mut result = Self::default();
        let mut operands: Vec<&str> = Vec::new();
        for token in da.split_whitespace() {
            match token {
                "Tf" => {
                    if let [.., font, size] = operands.as_slice() {
                        if let Some(font) = font.strip_prefix('/') {
                            result.font = font.to_string();
                        }
                        result.size = size.parse().unwrap_or(0.0);
                    }
                    operands.clear();
                }
                "g" | "rg" | "k" => {
                    let arity = match token {
                        "g" => 1,
                        "rg" => 3,
                        _ => 4,
                    };
                    if operands.len() >= arity {
                        let values: Option<Vec<f32>> = operands[operands.len() - arity..]
                            .iter()
                            .map(|v| v.parse().ok())
                            .collect();
                        if let Some(values) = values {
                            result.color = (token.to_string(), values);
                        }
                    }
                    operands.clear();
                }
                operand if !operand.chars().all(|c| c.is_ascii_alphabetic() || c == '*') => {
                    operands.push(operand)
                }
                _ => operands.clear(),
            }
        }
        result
    }
}

/// Everything needed to draw one text widget
#[derive(Debug, Clone)]
pub struct TextAppearance<'a> {
    pub value: &'a str,
    pub width: f32,
    pub height: f32,
    pub da: DefaultAppearance,
    pub quadding: Quadding,
    pub flags: i64,
    /// Maximum length, used by comb fields
    pub max_len: Option<i64>,
    /// Font dictionary or reference for the DA font
    pub font: Object,
}

impl TextAppearance<'_> {
    fn font_size(&self, lines: &[&str]) -> f32 {
        if self.da.size > 0.0 {
            return self.da.size;
        }
        let inner_width = (self.width - 2.0 * PADDING).max(1.0);
        let inner_height = (self.height - 2.0 * PADDING).max(1.0);
        let by_height = if lines.len() > 1 {
            inner_height / (lines.len() as f32 * LINE_SPACING)
        } else {
            inner_height * 0.8
        };
        let widest = lines
            .iter()
            .map(|line| text_width(line, 1.0))
            .fold(0.0_f32, f32::max);
        let by_width = if widest > 0.0 {
            inner_width / widest
        } else {
            MAX_AUTO_FONT_SIZE
        };
        by_height
            .min(by_width)
            .clamp(MIN_AUTO_FONT_SIZE, MAX_AUTO_FONT_SIZE)
    }

    fn line_x(&self, line: &str, size: f32) -> f32 {
        let free = self.width - 2.0 * PADDING - text_width(line, size);
        match self.quadding {
            Quadding::Left => PADDING,
            Quadding::Center => PADDING + (free / 2.0).max(0.0),
            Quadding::Right => PADDING + free.max(0.0),
        }
    }

    fn operations(&self) -> Vec<Operation> {
        let multiline = self.flags & FLAG_MULTILINE != 0;
        let lines: Vec<&str> = if multiline {
            self.value.lines().collect()
        } else {
            vec![self.value]
        };
        let size = self.font_size(&lines);
        let (color_op, color_values) = &self.da.color;

        let mut ops = vec![
            Operation::new("BMC", vec![Object::Name(b"Tx".to_vec())]),
            Operation::new("q", vec![]),
            Operation::new(
                "re",
                vec![
                    Object::Real(1.0),
                    Object::Real(1.0),
                    Object::Real((self.width - 2.0).max(0.0)),
                    Object::Real((self.height - 2.0).max(0.0)),
                ],
            ),
            Operation::new("W", vec![]),
            Operation::new("n", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(self.da.font.as_bytes().to_vec()),
                    Object::Real(size),
                ],
            ),
            Operation::new(
                color_op,
                color_values.iter().map(|v| Object::Real(*v)).collect(),
            ),
        ];

        let comb = self.flags & FLAG_COMB != 0 && !multiline;
        match (comb, self.max_len) {
            (true, Some(max_len)) if max_len > 0 => {
                let cell = self.width / max_len as f32;
                let baseline = (self.height - size * 0.78) / 2.0;
                for (i, ch) in self.value.chars().take(max_len as usize).enumerate() {
                    let glyph = ch.to_string();
                    let x = cell * i as f32 + (cell - text_width(&glyph, size)) / 2.0;
                    ops.push(Operation::new(
                        "Tm",
                        vec![
                            1.into(),
                            0.into(),
                            0.into(),
                            1.into(),
                            Object::Real(x),
                            Object::Real(baseline),
                        ],
                    ));
                    ops.push(show(&glyph));
                }
            }
            _ if multiline => {
                let leading = size * LINE_SPACING;
                let mut y = self.height - PADDING - size;
                for line in &lines {
                    ops.push(Operation::new(
                        "Tm",
                        vec![
                            1.into(),
                            0.into(),
                            0.into(),
                            1.into(),
                            Object::Real(self.line_x(line, size)),
                            Object::Real(y),
                        ],
                    ));
                    ops.push(show(line));
                    y -= leading;
                }
            }
            _ => {
                // vertically centred on the cap height
                let baseline = ((self.height - size * 0.78) / 2.0).max(PADDING / 2.0);
                ops.push(Operation::new(
                    "Td",
                    vec![
                        Object::Real(self.line_x(self.value, size)),
                        Object::Real(baseline),
                    ],
                ));
                ops.push(show(self.value));
            }
        }

        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
        ops.push(Operation::new("EMC", vec![]));
        ops
    }

    /// Build the Form XObject for the normal appearance.
    pub fn to_stream(&self) -> Result<Stream> {
        let content = Content {
            operations: self.operations(),
        };
        let mut fonts = Dictionary::new();
        fonts.set(self.da.font.as_bytes().to_vec(), self.font.clone());
        Ok(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "FormType" => 1,
                "BBox" => vec![0.into(), 0.into(), Object::Real(self.width), Object::Real(self.height)],
                "Resources" => dictionary! { "Font" => fonts },
            },
            content.encode()?,
        ))
    }
}

fn show(text: &str) -> Operation {
    Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)])
}

/// Encode for a WinAnsi/Latin-1 simple font; unmappable characters become `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Standard 14 Helvetica with WinAnsi encoding
pub fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

/// ZapfDingbats, used for check marks
pub fn zapf_dingbats() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "ZapfDingbats",
    }
}

/// Check mark appearance for a checkbox of the given size.
pub fn check_mark(width: f32, height: f32) -> Result<Stream> {
    let size = (width.min(height) * 0.8).max(MIN_AUTO_FONT_SIZE);
    // "4" is the check mark glyph in ZapfDingbats
    let glyph_width = 0.846 * size;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"ZaDb".to_vec()), Object::Real(size)]),
            Operation::new("g", vec![0.into()]),
            Operation::new(
                "Td",
                vec![
                    Object::Real((width - glyph_width) / 2.0),
                    Object::Real((height - size * 0.7) / 2.0),
                ],
            ),
            Operation::new("Tj", vec![Object::string_literal("4")]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
            "Resources" => dictionary! { "Font" => dictionary! { "ZaDb" => zapf_dingbats() } },
        },
        content.encode()?,
    ))
}

/// Empty appearance, used for the `Off` state.
pub fn empty(width: f32, height: f32) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
        },
        Vec::new(),
    )
}

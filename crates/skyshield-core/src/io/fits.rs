//! Minimal FITS (Flexible Image Transport System) image reader and writer.
//!
//! Supports single-plane images in any standard BITPIX (8, 16, 32, 64, -32,
//! -64) with BSCALE/BZERO scaling and integer BLANK values. If the primary HDU
//! carries no data the first IMAGE extension is read instead. Tables and
//! compressed images are not supported.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;
use tracing::debug;

use crate::consts::SKYSHIELD_VERSION;
use crate::error::{Result, SkyShieldError};
use crate::frame::Mask;

pub const FITS_BLOCK_SIZE: usize = 2880;
pub const FITS_CARD_SIZE: usize = 80;
const CARDS_PER_BLOCK: usize = FITS_BLOCK_SIZE / FITS_CARD_SIZE;

/// Keywords describing the data layout; never copied from a source header.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BSCALE", "BZERO",
    "BLANK", "END", "CHECKSUM", "DATASUM", "OSS_MASK", "OSS_VER",
];

/// A header card value.
#[derive(Clone, Debug, PartialEq)]
pub enum FitsValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl FitsValue {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw {
            "T" => return Some(Self::Bool(true)),
            "F" => return Some(Self::Bool(false)),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Self::Int(i));
        }
        if let Ok(f) = raw.replace(['D', 'd'], "E").parse::<f64>() {
            return Some(Self::Float(f));
        }
        Some(Self::Str(raw.to_string()))
    }

    /// Fixed-format value field (columns 11-30).
    fn format(&self) -> String {
        match self {
            Self::Str(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{escaped:<8}'")
            }
            Self::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            Self::Int(i) => format!("{i:>20}"),
            Self::Float(f) => format!("{:>20}", format_float(*f)),
        }
    }
}

fn format_float(f: f64) -> String {
    let s = format!("{f:?}");
    if s.len() <= 20 {
        s.to_uppercase()
    } else {
        format!("{f:.13E}")
    }
}

/// One 80-character header card.
#[derive(Clone, Debug, PartialEq)]
pub struct FitsCard {
    pub key: String,
    pub value: Option<FitsValue>,
    pub comment: Option<String>,
}

impl FitsCard {
    pub fn new(key: &str, value: FitsValue, comment: Option<&str>) -> Self {
        Self {
            key: key.to_ascii_uppercase(),
            value: Some(value),
            comment: comment.map(str::to_string),
        }
    }

    fn parse(card: &[u8]) -> Self {
        let text: String = card.iter().map(|&b| if b.is_ascii() { b as char } else { ' ' }).collect();
        let key = text.get(..8).unwrap_or(&text).trim_end().to_string();
        let rest = text.get(8..).unwrap_or("");

        if let Some(field) = rest.strip_prefix("= ") {
            let (value, comment) = split_value_comment(field);
            return Self {
                key,
                value,
                comment,
            };
        }
        let commentary = rest.trim_end();
        Self {
            key,
            value: None,
            comment: (!commentary.is_empty()).then(|| commentary.to_string()),
        }
    }

    fn to_bytes(&self) -> [u8; FITS_CARD_SIZE] {
        let mut text = format!("{:<8}", self.key);
        match &self.value {
            Some(value) => {
                text.push_str("= ");
                text.push_str(&value.format());
                if let Some(c) = &self.comment {
                    text.push_str(" / ");
                    text.push_str(c);
                }
            }
            None => {
                if let Some(c) = &self.comment {
                    text.push_str(c);
                }
            }
        }
        let mut out = [b' '; FITS_CARD_SIZE];
        for (dst, src) in out.iter_mut().zip(text.bytes().filter(u8::is_ascii)) {
            *dst = src;
        }
        out
    }
}

/// Split the part after `= ` into value and comment, honouring quoted strings.
fn split_value_comment(field: &str) -> (Option<FitsValue>, Option<String>) {
    let trimmed = field.trim_start();
    if let Some(body) = trimmed.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = body.char_indices().peekable();
        let mut end = body.len();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    value.push('\'');
                    chars.next();
                } else {
                    end = i + 1;
                    break;
                }
            } else {
                value.push(c);
            }
        }
        let comment = body[end..]
            .split_once('/')
            .map(|(_, c)| c.trim().to_string())
            .filter(|c| !c.is_empty());
        return (Some(FitsValue::Str(value.trim_end().to_string())), comment);
    }
    match field.split_once('/') {
        Some((v, c)) => (
            FitsValue::parse(v),
            Some(c.trim().to_string()).filter(|c| !c.is_empty()),
        ),
        None => (FitsValue::parse(field), None),
    }
}

/// Ordered list of header cards (without END).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    pub cards: Vec<FitsCard>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// First card with `key`.
    pub fn get(&self, key: &str) -> Option<&FitsValue> {
        self.cards
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
            .and_then(|c| c.value.as_ref())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            FitsValue::Str(s) => Some(s.clone()),
            FitsValue::Int(i) => Some(i.to_string()),
            FitsValue::Float(f) => Some(f.to_string()),
            FitsValue::Bool(b) => Some(if *b { "T" } else { "F" }.to_string()),
        }
    }

    /// Numeric value; quoted numbers are accepted too.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            FitsValue::Int(i) => Some(*i as f64),
            FitsValue::Float(f) => Some(*f),
            FitsValue::Str(s) => s.trim().parse().ok(),
            FitsValue::Bool(_) => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            FitsValue::Int(i) => Some(*i),
            FitsValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            FitsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Replace the first card with `key`, or append a new one.
    pub fn set(&mut self, key: &str, value: FitsValue, comment: Option<&str>) {
        let card = FitsCard::new(key, value, comment);
        match self.cards.iter_mut().find(|c| c.key.eq_ignore_ascii_case(key)) {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    /// Cards describing content rather than layout.
    pub fn descriptive_cards(&self) -> impl Iterator<Item = &FitsCard> {
        self.cards.iter().filter(|c| !is_structural(&c.key) && !c.key.is_empty())
    }

    fn require_i64(&self, key: &str) -> Result<i64> {
        self.get_i64(key)
            .ok_or_else(|| SkyShieldError::InvalidFits(format!("missing or invalid {key}")))
    }

    fn axes(&self) -> Result<Vec<usize>> {
        let naxis = self.require_i64("NAXIS")?;
        if !(0..=999).contains(&naxis) {
            return Err(SkyShieldError::InvalidFits(format!("invalid NAXIS {naxis}")));
        }
        (1..=naxis)
            .map(|i| {
                let n = self.require_i64(&format!("NAXIS{i}"))?;
                usize::try_from(n)
                    .map_err(|_| SkyShieldError::InvalidFits(format!("negative NAXIS{i}")))
            })
            .collect()
    }

    /// Bytes of data following this header (before block padding).
    fn data_size(&self) -> Result<usize> {
        let bitpix = self.require_i64("BITPIX")?;
        if ![8, 16, 32, 64, -32, -64].contains(&bitpix) {
            return Err(SkyShieldError::InvalidFits(format!("invalid BITPIX {bitpix}")));
        }
        let axes = self.axes()?;
        if axes.is_empty() {
            return Ok(0);
        }
        let pcount = self.get_i64("PCOUNT").unwrap_or(0).max(0) as usize;
        let gcount = self.get_i64("GCOUNT").unwrap_or(1).max(1) as usize;
        let overflow = || SkyShieldError::InvalidFits(format!("data size overflows for axes {axes:?}"));
        let elements = axes
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(overflow)?;
        pcount
            .checked_add(elements)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bitpix.unsigned_abs() as usize / 8))
            .ok_or_else(overflow)
    }
}

fn is_structural(key: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&key)
        || key
            .strip_prefix("NAXIS")
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

fn padded(len: usize) -> usize {
    len.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE
}

/// Offset of the next HDU, or `None` when it would lie past `usize::MAX`.
fn next_hdu_offset(data_offset: usize, data_size: usize) -> Option<usize> {
    data_size
        .div_ceil(FITS_BLOCK_SIZE)
        .checked_mul(FITS_BLOCK_SIZE)
        .and_then(|n| n.checked_add(data_offset))
}

/// A decoded image plane and the header it came from.
#[derive(Clone, Debug)]
pub struct FitsImage {
    pub data: Array2<f32>,
    pub header: FitsHeader,
}

/// Memory-mapped FITS file.
pub struct FitsReader {
    mmap: Mmap,
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < FITS_BLOCK_SIZE || !mmap.starts_with(b"SIMPLE  =") {
            return Err(SkyShieldError::InvalidFits(format!(
                "{}: missing SIMPLE card",
                path.display()
            )));
        }
        Ok(Self { mmap })
    }

    /// Read the first HDU holding a 2D (or higher) image.
    pub fn read_image(&self) -> Result<FitsImage> {
        let mut offset = 0;
        let mut primary: Option<FitsHeader> = None;

        while offset < self.mmap.len() {
            let (header, header_len) = parse_header(&self.mmap[offset..])?;
            let data_offset = offset + header_len;
            let data_size = header.data_size()?;
            let is_image = match header.get_str("XTENSION") {
                None => true,
                Some(x) => x.trim() == "IMAGE",
            };
            let axes = header.axes()?;

            let available = self.mmap.len().saturating_sub(data_offset);
            if data_size > available {
                return Err(SkyShieldError::InvalidFits(format!(
                    "HDU declares {data_size} data bytes, file has {available} left"
                )));
            }

            if is_image && axes.len() >= 2 && data_size > 0 {
                let data = decode_plane(&self.mmap, data_offset, &header, axes[1], axes[0])?;
                if axes.len() > 2 {
                    debug!(naxis = axes.len(), "Reading first plane of a data cube");
                }
                // Extension images inherit descriptive primary cards.
                let header = match primary {
                    Some(mut p) => {
                        for card in header.cards {
                            if let Some(existing) = p.cards.iter_mut().find(|c| c.key == card.key && card.value.is_some()) {
                                *existing = card;
                            } else {
                                p.cards.push(card);
                            }
                        }
                        p
                    }
                    None => header,
                };
                return Ok(FitsImage { data, header });
            }

            if primary.is_none() {
                primary = Some(header);
            }
            offset = match next_hdu_offset(data_offset, data_size) {
                Some(next) => next,
                None => break,
            };
        }

        Err(SkyShieldError::InvalidFits("no 2D image HDU found".into()))
    }
}

/// Parse header blocks until END. Returns the header and its padded length.
fn parse_header(buf: &[u8]) -> Result<(FitsHeader, usize)> {
    let mut header = FitsHeader::new();
    for (i, card) in buf.chunks_exact(FITS_CARD_SIZE).enumerate() {
        if card.starts_with(b"END") && card[3..].iter().all(|&b| b == b' ') {
            let cards_read = i + 1;
            let blocks = cards_read.div_ceil(CARDS_PER_BLOCK);
            return Ok((header, blocks * FITS_BLOCK_SIZE));
        }
        let parsed = FitsCard::parse(card);
        if !parsed.key.is_empty() || parsed.comment.is_some() {
            header.cards.push(parsed);
        }
    }
    Err(SkyShieldError::InvalidFits("header has no END card".into()))
}

fn decode_plane(buf: &[u8], offset: usize, header: &FitsHeader, height: usize, width: usize) -> Result<Array2<f32>> {
    let bitpix = header.require_i64("BITPIX")?;
    let bytes_per = bitpix.unsigned_abs() as usize / 8;
    let count = height
        .checked_mul(width)
        .ok_or_else(|| SkyShieldError::InvalidFits(format!("plane {height}x{width} too large")))?;
    let end = count
        .checked_mul(bytes_per)
        .and_then(|n| n.checked_add(offset))
        .unwrap_or(usize::MAX);
    if end > buf.len() {
        return Err(SkyShieldError::InvalidFits(format!(
            "data truncated: need {} bytes, have {}",
            end,
            buf.len()
        )));
    }

    let bscale = header.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = header.get_f64("BZERO").unwrap_or(0.0);
    let blank = header.get_i64("BLANK");
    let scale = |raw: i64| -> f32 {
        if Some(raw) == blank {
            f32::NAN
        } else {
            (bzero + bscale * raw as f64) as f32
        }
    };

    let mut cursor = Cursor::new(&buf[offset..end]);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let v = match bitpix {
            8 => scale(cursor.read_u8()? as i64),
            16 => scale(cursor.read_i16::<BigEndian>()? as i64),
            32 => scale(cursor.read_i32::<BigEndian>()? as i64),
            64 => scale(cursor.read_i64::<BigEndian>()?),
            -32 => (bzero + bscale * cursor.read_f32::<BigEndian>()? as f64) as f32,
            -64 => (bzero + bscale * cursor.read_f64::<BigEndian>()?) as f32,
            other => {
                return Err(SkyShieldError::InvalidFits(format!("unsupported BITPIX {other}")));
            }
        };
        values.push(v);
    }

    Array2::from_shape_vec((height, width), values)
        .map_err(|e| SkyShieldError::InvalidFits(e.to_string()))
}

/// Read the image plane of a FITS file.
pub fn read_fits(path: &Path) -> Result<FitsImage> {
    FitsReader::open(path)?.read_image()
}

/// Write `data` as a 32-bit float primary image, carrying the descriptive
/// cards of `header`.
pub fn write_fits_f32(path: &Path, data: &Array2<f32>, header: &FitsHeader) -> Result<()> {
    let (h, w) = data.dim();
    let mut cards = layout_cards(-32, h, w);
    cards.extend(header.descriptive_cards().cloned());

    let mut writer = BufWriter::new(File::create(path)?);
    write_header(&mut writer, &cards)?;
    for &v in data.iter() {
        writer.write_f32::<BigEndian>(v)?;
    }
    pad_data(&mut writer, h * w * 4)?;
    writer.flush()?;
    Ok(())
}

/// Write a contamination mask as an 8-bit image.
///
/// Descriptive cards of the source header are preserved and the provenance
/// tags `OSS_MASK = T` and `OSS_VER` are added.
pub fn write_mask(path: &Path, mask: &Mask, source_header: Option<&FitsHeader>) -> Result<()> {
    let (h, w) = mask.shape();
    let mut cards = layout_cards(8, h, w);
    if let Some(source) = source_header {
        cards.extend(source.descriptive_cards().cloned());
    }
    cards.push(FitsCard::new(
        "OSS_MASK",
        FitsValue::Bool(true),
        Some("satellite streak contamination mask"),
    ));
    cards.push(FitsCard::new(
        "OSS_VER",
        FitsValue::Str(SKYSHIELD_VERSION.to_string()),
        Some("skyshield version"),
    ));

    let mut writer = BufWriter::new(File::create(path)?);
    write_header(&mut writer, &cards)?;
    for &v in mask.data.iter() {
        writer.write_u8(u8::from(v))?;
    }
    pad_data(&mut writer, h * w)?;
    writer.flush()?;
    Ok(())
}

/// Read a mask written by [`write_mask`] (or any image where non-zero means
/// contaminated).
pub fn read_mask(path: &Path) -> Result<Mask> {
    let image = read_fits(path)?;
    Ok(Mask::new(image.data.mapv(|v| v.is_finite() && v != 0.0)))
}

fn layout_cards(bitpix: i64, height: usize, width: usize) -> Vec<FitsCard> {
    vec![
        FitsCard::new("SIMPLE", FitsValue::Bool(true), Some("conforms to FITS standard")),
        FitsCard::new("BITPIX", FitsValue::Int(bitpix), None),
        FitsCard::new("NAXIS", FitsValue::Int(2), None),
        FitsCard::new("NAXIS1", FitsValue::Int(width as i64), None),
        FitsCard::new("NAXIS2", FitsValue::Int(height as i64), None),
    ]
}

fn write_header(w: &mut impl Write, cards: &[FitsCard]) -> Result<()> {
    for card in cards {
        w.write_all(&card.to_bytes())?;
    }
    let mut end = [b' '; FITS_CARD_SIZE];
    end[..3].copy_from_slice(b"END");
    w.write_all(&end)?;

    let written = (cards.len() + 1) * FITS_CARD_SIZE;
    w.write_all(&vec![b' '; padded(written) - written])?;
    Ok(())
}

fn pad_data(w: &mut impl Write, written: usize) -> Result<()> {
    w.write_all(&vec![0u8; padded(written) - written])?;
    Ok(())
}

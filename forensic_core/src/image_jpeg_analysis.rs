//! JPEG Quantization Analysis
//!
//! Two estimates from the DQT segments of a JPEG stream:
//! - a fast estimate from the first table's DC coefficient (drives the check status)
//! - a best-fit match of the luminance table against the scaled IJG standard tables

#![allow(clippy::needless_range_loop)]

const MARKER_SOI: u8 = 0xD8;
const MARKER_DQT: u8 = 0xDB;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

/// Length of a DQT segment holding exactly one 8-bit 8x8 table (2 + 1 + 64).
pub const MIN_DQT_SEGMENT_LEN: usize = 67;

/// First usable DQT segment found by a raw byte scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DqtProbe {
    pub offset: usize,
    pub segment_length: usize,
    pub precision: u8,
    pub dc_coefficient: u16,
}

/// Scan for `FF DB` and read the DC coefficient of the first table whose segment
/// declares at least a full 8x8 table.
pub fn find_dqt(data: &[u8]) -> Option<DqtProbe> {
    let mut i = 0;
    while i + 5 < data.len() {
        if data[i] == 0xFF && data[i + 1] == MARKER_DQT {
            let length = ((data[i + 2] as usize) << 8) | data[i + 3] as usize;
            let precision = (data[i + 4] >> 4) & 0x0F;
            if length >= MIN_DQT_SEGMENT_LEN {
                let dc = if precision == 0 {
                    Some(data[i + 5] as u16)
                } else {
                    data.get(i + 6)
                        .map(|lo| ((data[i + 5] as u16) << 8) | *lo as u16)
                };
                if let Some(dc_coefficient) = dc {
                    return Some(DqtProbe {
                        offset: i,
                        segment_length: length,
                        precision,
                        dc_coefficient,
                    });
                }
            }
        }
        i += 1;
    }
    None
}

/// Piecewise inverse of the IJG quality scaling applied to the DC coefficient.
pub fn quality_from_dc(coeff: u16) -> u8 {
    let c = coeff as f64;
    let q = if coeff < 2 {
        98.0
    } else if coeff < 10 {
        100.0 - 2.0 * c
    } else if coeff < 50 {
        5000.0 / c
    } else {
        200.0 - 2.0 * c
    };
    q.round().clamp(1.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityBand {
    Low,
    Medium,
    Good,
    High,
}

impl QualityBand {
    pub fn from_quality(q: u8) -> Self {
        match q {
            0..=49 => QualityBand::Low,
            50..=74 => QualityBand::Medium,
            75..=89 => QualityBand::Good,
            _ => QualityBand::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityBand::Low => "low",
            QualityBand::Medium => "medium",
            QualityBand::Good => "good",
            QualityBand::High => "high",
        }
    }
}

const IJG_LUMINANCE_BASE: [[u16; 8]; 8] = [
    [16, 11, 10, 16, 24, 40, 51, 61],
    [12, 12, 14, 19, 26, 58, 60, 55],
    [14, 13, 16, 24, 40, 57, 69, 56],
    [14, 17, 22, 29, 51, 87, 80, 62],
    [18, 22, 37, 56, 68, 109, 103, 77],
    [24, 35, 55, 64, 81, 104, 113, 92],
    [49, 64, 78, 87, 103, 121, 120, 101],
    [72, 92, 95, 98, 112, 100, 103, 99],
];

const ZIGZAG_ORDER: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

fn generate_standard_qt(quality: u8) -> [[u16; 8]; 8] {
    let q = quality.clamp(1, 100) as f64;
    let scale = if q < 50.0 { 5000.0 / q } else { 200.0 - 2.0 * q };

    let mut result = [[0u16; 8]; 8];
    for i in 0..8 {
        for j in 0..8 {
            let value = ((scale * IJG_LUMINANCE_BASE[i][j] as f64) + 50.0) / 100.0;
            result[i][j] = value.floor().clamp(1.0, 255.0) as u16;
        }
    }
    result
}

fn calculate_sse(a: &[[u16; 8]; 8], b: &[[u16; 8]; 8]) -> f64 {
    let mut sse = 0.0;
    for i in 0..8 {
        for j in 0..8 {
            let diff = a[i][j] as f64 - b[i][j] as f64;
            sse += diff * diff;
        }
    }
    sse
}

/// Walk the marker stream and collect every quantization table until SOS.
pub fn extract_quantization_tables(data: &[u8]) -> Vec<[[u16; 8]; 8]> {
    let mut tables = Vec::new();
    if data.len() < 4 || data[0] != 0xFF || data[1] != MARKER_SOI {
        return tables;
    }
    let mut pos = 2;

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        if pos >= data.len() {
            break;
        }

        let marker = data[pos];
        pos += 1;

        if marker == MARKER_SOI || marker == MARKER_EOI || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if pos + 2 > data.len() {
            break;
        }
        let length = ((data[pos] as usize) << 8) | (data[pos + 1] as usize);

        if marker == MARKER_DQT {
            let segment_end = (pos + length).min(data.len());
            let mut seg_pos = pos + 2;

            while seg_pos < segment_end {
                let precision = (data[seg_pos] >> 4) & 0x0F;
                seg_pos += 1;
                let width = if precision == 0 { 1 } else { 2 };
                if seg_pos + 64 * width > data.len() {
                    break;
                }
                let mut table = [[0u16; 8]; 8];
                for i in 0..64 {
                    let (row, col) = (ZIGZAG_ORDER[i] / 8, ZIGZAG_ORDER[i] % 8);
                    table[row][col] = if width == 1 {
                        data[seg_pos] as u16
                    } else {
                        ((data[seg_pos] as u16) << 8) | data[seg_pos + 1] as u16
                    };
                    seg_pos += width;
                }
                tables.push(table);
            }
        }

        if length < 2 || marker == MARKER_SOS {
            break;
        }
        pos += length;
    }
    tables
}

/// Best-fitting IJG quality for the first (luminance) table and whether the fit is exact.
pub fn ijg_table_match(data: &[u8]) -> Option<(u8, bool)> {
    let tables = extract_quantization_tables(data);
    let luma = tables.first()?;

    let mut best = (75u8, f64::MAX);
    for q in 1..=100u8 {
        let sse = calculate_sse(luma, &generate_standard_qt(q));
        if sse == 0.0 {
            return Some((q, true));
        }
        if sse < best.1 {
            best = (q, sse);
        }
    }
    Some((best.0, false))
}

//! Locating JPEG previews inside TIFF-based RAW containers
//!
//! DNG files record their previews in the IFD tree: the main preview usually
//! sits in a SubIFD as a single JPEG strip, the EXIF-style thumbnail in IFD1
//! via `JPEGInterchangeFormat`. When the tree yields nothing, JPEG streams are
//! found by walking marker segments, so thumbnails nested in an APP1 segment
//! do not cut the enclosing stream short.

use std::ops::Range;

const TIFF_MAGIC_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00];
const TIFF_MAGIC_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A];

const TAG_COMPRESSION: u16 = 0x0103;
const TAG_PHOTOMETRIC: u16 = 0x0106;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_SUBIFDS: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201;
const TAG_JPEG_LENGTH: u16 = 0x0202;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_IFD: u16 = 13;

const COMPRESSION_OLD_JPEG: u32 = 6;
const COMPRESSION_JPEG: u32 = 7;

// Sensor data, not a rendered preview
const PHOTOMETRIC_CFA: u32 = 32803;
const PHOTOMETRIC_LINEAR_RAW: u32 = 34892;

const MAX_IFD_ENTRIES: u16 = 1000;
const MAX_IFDS: usize = 64;

const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        })
    }
}

struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Position of the 4-byte value/offset field
    value_at: usize,
}

struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Tiff<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(..4)? {
            magic if magic == &TIFF_MAGIC_LE[..] => ByteOrder::Little,
            magic if magic == &TIFF_MAGIC_BE[..] => ByteOrder::Big,
            _ => return None,
        };
        Some(Self { data, order })
    }

    fn first_ifd(&self) -> Option<usize> {
        self.order.u32(self.data, 4).map(|offset| offset as usize)
    }

    /// Entries of the IFD at `offset` and the offset of the next IFD
    fn read_ifd(&self, offset: usize) -> Option<(Vec<IfdEntry>, usize)> {
        let count = self.order.u16(self.data, offset)?;
        if count > MAX_IFD_ENTRIES {
            return None;
        }

        let entries: Vec<IfdEntry> = (0..usize::from(count))
            .map_while(|index| {
                let at = offset + 2 + index * 12;
                Some(IfdEntry {
                    tag: self.order.u16(self.data, at)?,
                    field_type: self.order.u16(self.data, at + 2)?,
                    count: self.order.u32(self.data, at + 4)?,
                    value_at: at + 8,
                })
            })
            .collect();

        let next = self
            .order
            .u32(self.data, offset + 2 + usize::from(count) * 12)
            .unwrap_or(0);

        Some((entries, next as usize))
    }

    /// First value of a SHORT or LONG entry
    fn value(&self, entry: &IfdEntry) -> Option<u32> {
        match entry.field_type {
            TYPE_SHORT => self.order.u16(self.data, entry.value_at).map(u32::from),
            TYPE_LONG | TYPE_IFD => self.order.u32(self.data, entry.value_at),
            _ => None,
        }
    }

    /// Every offset held by a SubIFDs entry
    fn sub_ifds(&self, entry: &IfdEntry) -> Vec<usize> {
        if entry.count <= 1 {
            return self.value(entry).map(|v| v as usize).into_iter().collect();
        }

        let Some(base) = self.order.u32(self.data, entry.value_at) else {
            return Vec::new();
        };
        (0..(entry.count as usize).min(MAX_IFDS))
            .filter_map(|index| self.order.u32(self.data, base as usize + index * 4))
            .map(|offset| offset as usize)
            .collect()
    }

    /// JPEG stream an IFD points at, if any
    fn jpeg_range(&self, entries: &[IfdEntry]) -> Option<Range<usize>> {
        let value = |tag: u16| {
            entries
                .iter()
                .find(|entry| entry.tag == tag)
                .and_then(|entry| self.value(entry))
        };

        let single_strip = entries
            .iter()
            .any(|entry| entry.tag == TAG_STRIP_OFFSETS && entry.count == 1);
        let jpeg_strip = matches!(
            value(TAG_COMPRESSION),
            Some(COMPRESSION_OLD_JPEG | COMPRESSION_JPEG)
        );
        let sensor_data = matches!(
            value(TAG_PHOTOMETRIC),
            Some(PHOTOMETRIC_CFA | PHOTOMETRIC_LINEAR_RAW)
        );

        let (offset, length) = match (value(TAG_JPEG_OFFSET), value(TAG_JPEG_LENGTH)) {
            (Some(offset), Some(length)) => (offset, length),
            _ if single_strip && jpeg_strip && !sensor_data => {
                (value(TAG_STRIP_OFFSETS)?, value(TAG_STRIP_BYTE_COUNTS)?)
            }
            _ => return None,
        };

        let start = offset as usize;
        let end = start.checked_add(length as usize)?;
        let stream = self.data.get(start..end)?;
        stream.starts_with(&JPEG_SOI[..2]).then_some(start..end)
    }
}

/// JPEG streams referenced from the TIFF IFD tree (IFD chain and SubIFDs)
pub fn tiff_preview_ranges(data: &[u8]) -> Vec<Range<usize>> {
    let Some(tiff) = Tiff::parse(data) else {
        return Vec::new();
    };

    let mut pending: Vec<usize> = tiff.first_ifd().into_iter().collect();
    let mut visited = Vec::new();
    let mut ranges = Vec::new();

    while let Some(offset) = pending.pop() {
        if offset == 0 || visited.contains(&offset) {
            continue;
        }
        if visited.len() >= MAX_IFDS {
            break;
        }
        visited.push(offset);

        let Some((entries, next)) = tiff.read_ifd(offset) else {
            continue;
        };

        pending.push(next);
        for entry in entries.iter().filter(|entry| entry.tag == TAG_SUBIFDS) {
            pending.extend(tiff.sub_ifds(entry));
        }
        ranges.extend(tiff.jpeg_range(&entries));
    }

    ranges
}

/// Complete top-level JPEG streams found by scanning for SOI markers.
///
/// Streams nested inside another stream's segments are not reported.
pub fn scan_jpeg_streams(data: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0;

    while let Some(start) = find(&data[offset..], &JPEG_SOI).map(|i| offset + i) {
        match jpeg_stream_end(data, start) {
            Some(end) => {
                ranges.push(start..end);
                offset = end;
            }
            None => offset = start + 1,
        }
    }

    ranges
}

/// End (exclusive) of the JPEG stream whose SOI is at `start`
fn jpeg_stream_end(data: &[u8], start: usize) -> Option<usize> {
    let mut pos = start + 2;

    loop {
        // Fill bytes before a marker
        while data.get(pos) == Some(&0xFF) && data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if *data.get(pos)? != 0xFF {
            return None;
        }

        let marker = *data.get(pos + 1)?;
        match marker {
            MARKER_EOI => return Some(pos + 2),
            0x01 | 0xD0..=0xD7 => pos += 2,
            _ => {
                let length = usize::from(u16::from_be_bytes([*data.get(pos + 2)?, *data.get(pos + 3)?]));
                if length < 2 {
                    return None;
                }
                pos += 2 + length;
                if marker == MARKER_SOS {
                    pos = skip_entropy_data(data, pos)?;
                }
            }
        }
    }
}

/// Position of the first real marker after entropy-coded data
fn skip_entropy_data(data: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        if *data.get(pos)? == 0xFF {
            match *data.get(pos + 1)? {
                // Stuffed zero, restart markers and fill bytes stay in the scan
                0x00 | 0xD0..=0xD7 => pos += 2,
                0xFF => pos += 1,
                _ => return Some(pos),
            }
        } else {
            pos += 1;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

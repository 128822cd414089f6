//! Minimal in-memory reader for OLE2 compound files.
//!
//! Only what the Word binary reader needs: the FAT, the MiniFAT, the
//! directory, and root-level streams by name.

use crate::error::{Error, Result};

const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const HEADER_SIZE: usize = 512;
const DIRENTRY_SIZE: usize = 128;
const HEADER_DIFAT_ENTRIES: usize = 109;

const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;
const NOSTREAM: u32 = 0xFFFF_FFFF;

const STGTY_STREAM: u8 = 2;

/// Whether `data` starts with the compound file signature.
pub fn is_compound_file(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && &data[..8] == MAGIC
}

#[derive(Debug, Clone)]
struct DirEntry {
    name: String,
    kind: u8,
    left: u32,
    right: u32,
    child: u32,
    start: u32,
    size: u64,
}

/// A parsed compound file borrowing its bytes.
#[derive(Debug)]
pub struct CompoundFile<'a> {
    data: &'a [u8],
    sector_size: usize,
    mini_sector_size: usize,
    mini_cutoff: u64,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    entries: Vec<DirEntry>,
    ministream: Vec<u8>,
}

impl<'a> CompoundFile<'a> {
    /// Parse the header, allocation tables and directory.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if !is_compound_file(data) {
            return Err(corrupt("missing compound file signature"));
        }

        let sector_shift = read_u16(data, 0x1E).unwrap_or(9);
        let mini_sector_shift = read_u16(data, 0x20).unwrap_or(6);
        if !(7..=16).contains(&sector_shift) || mini_sector_shift >= sector_shift {
            return Err(corrupt("invalid sector size"));
        }

        let mut cfb = CompoundFile {
            data,
            sector_size: 1 << sector_shift,
            mini_sector_size: 1 << mini_sector_shift,
            mini_cutoff: read_u32(data, 0x38).unwrap_or(4096) as u64,
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            ministream: Vec::new(),
        };

        cfb.load_fat()?;

        let first_dir = read_u32(data, 0x30).unwrap_or(ENDOFCHAIN);
        let dir_data = cfb.read_chain(first_dir)?;
        cfb.entries = dir_data
            .chunks_exact(DIRENTRY_SIZE)
            .map(parse_entry)
            .collect();
        let root = cfb
            .entries
            .first()
            .cloned()
            .ok_or_else(|| corrupt("empty directory"))?;

        let first_minifat = read_u32(data, 0x3C).unwrap_or(ENDOFCHAIN);
        if first_minifat != ENDOFCHAIN {
            cfb.minifat = to_u32s(&cfb.read_chain(first_minifat)?);
            let mut ministream = cfb.read_chain(root.start)?;
            ministream.truncate(root.size as usize);
            cfb.ministream = ministream;
        }

        log::debug!(
            "Compound file: sector size {}, {} directory entries",
            cfb.sector_size,
            cfb.entries.len()
        );
        Ok(cfb)
    }

    /// Read a root-level stream by name (case-insensitive).
    pub fn stream(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find_root_stream(name)
            .ok_or_else(|| corrupt(format!("missing stream {}", name)))?;

        let mut data = if entry.size < self.mini_cutoff {
            self.read_mini_chain(entry.start)?
        } else {
            self.read_chain(entry.start)?
        };
        if (data.len() as u64) < entry.size {
            return Err(corrupt(format!("stream {} is truncated", name)));
        }
        data.truncate(entry.size as usize);
        Ok(data)
    }

    /// Whether a root-level stream exists.
    pub fn has_stream(&self, name: &str) -> bool {
        self.find_root_stream(name).is_some()
    }

    fn find_root_stream(&self, name: &str) -> Option<&DirEntry> {
        let root = self.entries.first()?;
        let mut stack = vec![root.child];
        let mut visited = 0;

        // Siblings form a binary tree below the root's child
        while let Some(sid) = stack.pop() {
            if sid == NOSTREAM || visited > self.entries.len() {
                continue;
            }
            visited += 1;
            let entry = self.entries.get(sid as usize)?;
            if entry.kind == STGTY_STREAM && entry.name.eq_ignore_ascii_case(name) {
                return Some(entry);
            }
            stack.push(entry.left);
            stack.push(entry.right);
        }
        None
    }

    fn load_fat(&mut self) -> Result<()> {
        let mut fat_sectors: Vec<u32> = (0..HEADER_DIFAT_ENTRIES)
            .filter_map(|i| read_u32(self.data, 0x4C + i * 4))
            .take_while(|&s| s != FREESECT && s != ENDOFCHAIN)
            .collect();

        let per_sector = self.sector_size / 4;
        let mut difat = read_u32(self.data, 0x44).unwrap_or(ENDOFCHAIN);
        let difat_count = read_u32(self.data, 0x48).unwrap_or(0);
        for _ in 0..difat_count {
            if difat == ENDOFCHAIN || difat == FREESECT {
                break;
            }
            let sector = self.sector(difat)?;
            let entries = to_u32s(sector);
            fat_sectors.extend(
                entries[..per_sector - 1]
                    .iter()
                    .copied()
                    .take_while(|&s| s != FREESECT && s != ENDOFCHAIN),
            );
            difat = entries[per_sector - 1];
        }

        for sector_id in fat_sectors {
            let sector = self.sector(sector_id)?;
            self.fat.extend(to_u32s(sector));
        }
        Ok(())
    }

    fn sector(&self, id: u32) -> Result<&'a [u8]> {
        let start = (id as usize + 1) * self.sector_size;
        self.data
            .get(start..start + self.sector_size)
            .ok_or_else(|| corrupt(format!("sector {} out of range", id)))
    }

    fn read_chain(&self, start: u32) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut sector = start;
        let mut steps = 0;

        while sector != ENDOFCHAIN {
            if steps > self.fat.len() {
                return Err(corrupt("cyclic sector chain"));
            }
            data.extend_from_slice(self.sector(sector)?);
            sector = *self
                .fat
                .get(sector as usize)
                .ok_or_else(|| corrupt("sector outside the FAT"))?;
            steps += 1;
        }
        Ok(data)
    }

    fn read_mini_chain(&self, start: u32) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut sector = start;
        let mut steps = 0;

        while sector != ENDOFCHAIN {
            if steps > self.minifat.len() {
                return Err(corrupt("cyclic mini sector chain"));
            }
            let offset = sector as usize * self.mini_sector_size;
            let chunk = self
                .ministream
                .get(offset..offset + self.mini_sector_size)
                .ok_or_else(|| corrupt("mini sector out of range"))?;
            data.extend_from_slice(chunk);
            sector = *self
                .minifat
                .get(sector as usize)
                .ok_or_else(|| corrupt("sector outside the MiniFAT"))?;
            steps += 1;
        }
        Ok(data)
    }
}

fn parse_entry(raw: &[u8]) -> DirEntry {
    let name_len = (read_u16(raw, 64).unwrap_or(0) as usize).min(64);
    let units: Vec<u16> = raw[..name_len]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();

    DirEntry {
        name: String::from_utf16_lossy(&units),
        kind: raw[66],
        left: read_u32(raw, 68).unwrap_or(NOSTREAM),
        right: read_u32(raw, 72).unwrap_or(NOSTREAM),
        child: read_u32(raw, 76).unwrap_or(NOSTREAM),
        start: read_u32(raw, 116).unwrap_or(ENDOFCHAIN),
        // Version 3 files may leave garbage in the high half
        size: read_u32(raw, 120).unwrap_or(0) as u64,
    }
}

fn to_u32s(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn corrupt(message: impl Into<String>) -> Error {
    Error::SourceRead(format!("compound file: {}", message.into()))
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Build a version 3 compound file holding root-level streams in regular sectors.
#[cfg(test)]
pub(crate) fn build_compound_file(streams: &[(&str, &[u8])]) -> Vec<u8> {
    const SECTOR: usize = 512;
    const FATSECT: u32 = 0xFFFF_FFFD;

    let sectors_for = |len: usize| len.div_ceil(SECTOR);
    let dir_sectors = sectors_for((streams.len() + 1) * DIRENTRY_SIZE);
    let data_sectors: usize = streams.iter().map(|(_, d)| sectors_for(d.len())).sum();
    let mut fat_sectors = 1;
    while fat_sectors * (SECTOR / 4) < fat_sectors + dir_sectors + data_sectors {
        fat_sectors += 1;
    }

    let mut fat: Vec<u32> = vec![FATSECT; fat_sectors];
    let chain = |fat: &mut Vec<u32>, count: usize| -> u32 {
        let start = fat.len() as u32;
        for i in 0..count {
            let next = if i + 1 == count { ENDOFCHAIN } else { start + i as u32 + 1 };
            fat.push(next);
        }
        if count == 0 {
            ENDOFCHAIN
        } else {
            start
        }
    };
    let first_dir = chain(&mut fat, dir_sectors);
    let starts: Vec<u32> = streams
        .iter()
        .map(|(_, d)| chain(&mut fat, sectors_for(d.len())))
        .collect();
    fat.resize(fat_sectors * SECTOR / 4, FREESECT);

    let mut header = vec![0u8; HEADER_SIZE];
    header[..8].copy_from_slice(MAGIC);
    header[0x18..0x1A].copy_from_slice(&0x3Eu16.to_le_bytes());
    header[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
    header[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
    header[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
    header[0x2C..0x30].copy_from_slice(&(fat_sectors as u32).to_le_bytes());
    header[0x30..0x34].copy_from_slice(&first_dir.to_le_bytes());
    // No stream is small enough for the mini stream
    header[0x38..0x3C].copy_from_slice(&0u32.to_le_bytes());
    header[0x3C..0x40].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    header[0x44..0x48].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    for i in 0..HEADER_DIFAT_ENTRIES {
        let value = if i < fat_sectors { i as u32 } else { FREESECT };
        header[0x4C + i * 4..0x50 + i * 4].copy_from_slice(&value.to_le_bytes());
    }

    let entry = |name: &str, kind: u8, right: u32, child: u32, start: u32, size: u32| {
        let mut raw = vec![0u8; DIRENTRY_SIZE];
        let units: Vec<u16> = name.encode_utf16().collect();
        for (i, u) in units.iter().enumerate() {
            raw[i * 2..i * 2 + 2].copy_from_slice(&u.to_le_bytes());
        }
        raw[64..66].copy_from_slice(&(((units.len() + 1) * 2) as u16).to_le_bytes());
        raw[66] = kind;
        raw[68..72].copy_from_slice(&NOSTREAM.to_le_bytes());
        raw[72..76].copy_from_slice(&right.to_le_bytes());
        raw[76..80].copy_from_slice(&child.to_le_bytes());
        raw[116..120].copy_from_slice(&start.to_le_bytes());
        raw[120..124].copy_from_slice(&size.to_le_bytes());
        raw
    };

    let mut directory = entry(
        "Root Entry",
        5,
        NOSTREAM,
        if streams.is_empty() { NOSTREAM } else { 1 },
        ENDOFCHAIN,
        0,
    );
    for (i, (name, data)) in streams.iter().enumerate() {
        let right = if i + 1 < streams.len() { i as u32 + 2 } else { NOSTREAM };
        directory.extend(entry(name, STGTY_STREAM, right, NOSTREAM, starts[i], data.len() as u32));
    }
    directory.resize(dir_sectors * SECTOR, 0);

    let mut out = header;
    for value in &fat {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend(directory);
    for (_, data) in streams {
        let mut padded = data.to_vec();
        padded.resize(sectors_for(data.len()) * SECTOR, 0);
        out.extend(padded);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_root_streams() {
        let big = vec![7u8; 1300];
        let data = build_compound_file(&[("WordDocument", b"hello"), ("1Table", &big)]);
        let cfb = CompoundFile::parse(&data).unwrap();

        assert_eq!(cfb.stream("WordDocument").unwrap(), b"hello");
        assert_eq!(cfb.stream("1table").unwrap(), big);
        assert!(cfb.has_stream("1Table"));
        assert!(!cfb.has_stream("Data"));
        assert!(matches!(cfb.stream("Data"), Err(Error::SourceRead(_))));
    }

    #[test]
    fn test_rejects_other_data() {
        assert!(!is_compound_file(b"PK\x03\x04"));
        assert!(matches!(
            CompoundFile::parse(&[0u8; 600]),
            Err(Error::SourceRead(_))
        ));
    }

    #[test]
    fn test_truncated_file() {
        let mut data = build_compound_file(&[("WordDocument", &[1u8; 2000])]);
        data.truncate(data.len() - 600);
        let result = CompoundFile::parse(&data).and_then(|cfb| cfb.stream("WordDocument"));
        assert!(matches!(result, Err(Error::SourceRead(_))));
    }

    #[test]
    fn test_read_helpers() {
        let data = [0x34, 0x12, 0x78, 0x56];
        assert_eq!(read_u16(&data, 0), Some(0x1234));
        assert_eq!(read_u32(&data, 0), Some(0x5678_1234));
        assert_eq!(read_u16(&data, 3), None);
    }
}

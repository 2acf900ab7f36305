//! In-memory view of the zip container behind a `.docx` file.
//!
//! Every entry is read eagerly so parts can be replaced in place and the whole
//! archive written back out with the original entry order.

use super::error::ContainerError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

#[derive(Debug, Clone)]
pub struct Container {
    entries: Vec<Entry>,
}

impl Container {
    /// Opens `bytes` as a zip archive.
    pub fn open(bytes: &[u8]) -> Result<Self, ContainerError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        if archive.is_empty() {
            return Err(ContainerError::Empty);
        }

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        log::debug!("opened container with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| !entry.is_dir && entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    /// Names of the file entries, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| entry.name.as_str())
    }

    /// Replaces the content of `name`, appending a new deflated entry if the
    /// part does not exist yet.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self
            .entries
            .iter_mut()
            .find(|entry| !entry.is_dir && entry.name == name)
        {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }

    /// Serializes the container back into zip bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);

            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
            } else {
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(&entry.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

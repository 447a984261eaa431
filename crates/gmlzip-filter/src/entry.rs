use std::io::Read;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime};

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Metadata of a source archive member, carried over to its rewritten copy.
#[derive(Clone, Debug)]
pub struct EntryMeta {
    pub name: String,
    pub size: u64,
    pub compression: CompressionMethod,
    pub last_modified: Option<DateTime>,
    pub unix_mode: Option<u32>,
}

impl EntryMeta {
    pub fn from_zip<R: Read>(file: &zip::read::ZipFile<'_, R>) -> Self {
        Self {
            name: file.name().to_owned(),
            size: file.size(),
            compression: file.compression(),
            last_modified: file.last_modified(),
            unix_mode: file.unix_mode(),
        }
    }

    /// Options for writing rewritten content under this entry's name.
    ///
    /// Stored entries stay stored; everything else is deflated, since the
    /// writer cannot assume support for the source's method.
    pub fn write_options(&self) -> SimpleFileOptions {
        let method = match self.compression {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };

        let mut options = SimpleFileOptions::default()
            .compression_method(method)
            .large_file(self.size >= ZIP64_THRESHOLD);

        if let Some(modified) = self.last_modified {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = self.unix_mode {
            options = options.unix_permissions(mode);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::{ZipArchive, ZipWriter};

    use super::*;

    fn archive_with(options: SimpleFileOptions) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("udx/bldg/a.gml", options).unwrap();
        writer.write_all(b"<core:CityModel/>\n").unwrap();
        let cursor = writer.finish().unwrap();
        ZipArchive::new(cursor).unwrap()
    }

    #[test]
    fn captures_source_metadata() {
        let modified = DateTime::from_date_and_time(2024, 5, 17, 10, 30, 0).unwrap();
        let mut archive = archive_with(
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(modified)
                .unix_permissions(0o640),
        );

        let file = archive.by_index(0).unwrap();
        let meta = EntryMeta::from_zip(&file);
        assert_eq!(meta.name, "udx/bldg/a.gml");
        assert_eq!(meta.size, 18);
        assert_eq!(meta.compression, CompressionMethod::Stored);
        assert_eq!(meta.last_modified, Some(modified));
        assert_eq!(meta.unix_mode.map(|m| m & 0o777), Some(0o640));
    }

    #[test]
    fn rewritten_entry_keeps_metadata() {
        let modified = DateTime::from_date_and_time(2023, 1, 2, 3, 4, 6).unwrap();
        let mut archive = archive_with(
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(modified),
        );
        let meta = EntryMeta::from_zip(&archive.by_index(0).unwrap());

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(meta.name.as_str(), meta.write_options()).unwrap();
        writer.write_all(b"<core:CityModel/>\n").unwrap();
        let mut rewritten = ZipArchive::new(writer.finish().unwrap()).unwrap();

        let copy = rewritten.by_index(0).unwrap();
        assert_eq!(copy.name(), "udx/bldg/a.gml");
        assert_eq!(copy.compression(), CompressionMethod::Deflated);
        assert_eq!(copy.last_modified(), Some(modified));
    }
}

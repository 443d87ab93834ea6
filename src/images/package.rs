//! Image package backends.

use crate::common::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// External storage for image payloads.
///
/// The RTF reader writes each decoded picture into a fresh stream; the XAML
/// side reads payloads back by the name stored in the markup.
pub trait ImagePackage {
    /// Open a stream for the `index`-th image of a conversion. Returns the
    /// writer and the name under which the markup references the payload.
    fn create_image_stream(
        &mut self,
        index: usize,
        mime_type: &str,
    ) -> Result<(Box<dyn Write + '_>, String)>;

    /// Open a previously stored payload.
    fn get_image_stream(&self, name: &str) -> Result<Box<dyn Read + '_>>;
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// Stream name for the `index`-th image: `Image1.png`, `Image2.jpg`, ...
pub fn image_name(index: usize, mime_type: &str) -> String {
    format!("Image{}.{}", index + 1, extension_for_mime(mime_type))
}

/// Package keeping payloads in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryImagePackage {
    images: BTreeMap<String, Vec<u8>>,
}

impl MemoryImagePackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.images.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.images.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImagePackage for MemoryImagePackage {
    fn create_image_stream(
        &mut self,
        index: usize,
        mime_type: &str,
    ) -> Result<(Box<dyn Write + '_>, String)> {
        let name = image_name(index, mime_type);
        let buffer = self.images.entry(name.clone()).or_default();
        buffer.clear();
        Ok((Box::new(buffer), name))
    }

    fn get_image_stream(&self, name: &str) -> Result<Box<dyn Read + '_>> {
        match self.images.get(name) {
            Some(data) => Ok(Box::new(data.as_slice())),
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no image named {}", name),
            ))),
        }
    }
}

/// Package storing payloads as files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryImagePackage {
    root: PathBuf,
}

impl DirectoryImagePackage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a stream name to a path inside the root. Names must be bare
    /// file names.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let candidate = Path::new(name);
        match candidate.file_name() {
            Some(file) if file == candidate.as_os_str() => Ok(self.root.join(file)),
            _ => Err(Error::InvalidFormat(format!(
                "image name {} is not a plain file name",
                name
            ))),
        }
    }
}

impl ImagePackage for DirectoryImagePackage {
    fn create_image_stream(
        &mut self,
        index: usize,
        mime_type: &str,
    ) -> Result<(Box<dyn Write + '_>, String)> {
        fs::create_dir_all(&self.root)?;
        let name = image_name(index, mime_type);
        let file = File::create(self.resolve(&name)?)?;
        Ok((Box::new(BufWriter::new(file)), name))
    }

    fn get_image_stream(&self, name: &str) -> Result<Box<dyn Read + '_>> {
        let file = File::open(self.resolve(name)?)?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_image_name() {
        assert_eq!(image_name(0, "image/png"), "Image1.png");
        assert_eq!(image_name(4, "image/jpeg"), "Image5.jpg");
    }

    #[test]
    fn test_memory_package_roundtrip() {
        let mut package = MemoryImagePackage::new();
        {
            let (mut stream, name) = package.create_image_stream(0, "image/png").unwrap();
            assert_eq!(name, "Image1.png");
            stream.write_all(b"\x89PNG").unwrap();
        }
        assert_eq!(package.len(), 1);
        let mut data = Vec::new();
        package
            .get_image_stream("Image1.png")
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data, b"\x89PNG");
        assert!(package.get_image_stream("missing.png").is_err());
    }

    #[test]
    fn test_directory_package_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut package = DirectoryImagePackage::new(dir.path().join("media"));
        {
            let (mut stream, name) = package.create_image_stream(1, "image/jpeg").unwrap();
            assert_eq!(name, "Image2.jpg");
            stream.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();
            stream.flush().unwrap();
        }
        let mut data = Vec::new();
        package
            .get_image_stream("Image2.jpg")
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data, vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_directory_package_rejects_paths() {
        let dir = TempDir::new().unwrap();
        let package = DirectoryImagePackage::new(dir.path());
        assert!(package.get_image_stream("../secret.png").is_err());
        assert!(package.get_image_stream("a/b.png").is_err());
    }
}

// src/core/package.rs

//! Packaged recipes: a gzip tarball holding `recipe.json` and the implementation
//! files, identified by the blake3 hash of its bytes.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, HeaderMode};
use walkdir::WalkDir;

use crate::constants::{PACKAGE_IGNORED_ENTRIES, RECIPE_MANIFEST_FILENAME};
use crate::core::cache::content_hash;
use crate::core::error::{RecipeError, RecipeResult};
use crate::core::recipe_file::RecipeFile;
use crate::system::transport::Downloader;

/// A recipe tarball in memory.
#[derive(Debug, Clone)]
pub struct RecipePackage {
    recipe_file: RecipeFile,
    bytes: Vec<u8>,
    content_hash: String,
}

fn invalid(reason: impl Into<String>) -> RecipeError {
    RecipeError::InvalidPackage {
        reason: reason.into(),
    }
}

impl RecipePackage {
    /// Packs a recipe directory. The directory must contain a `recipe.json`.
    ///
    /// Entries are added in sorted order with normalized headers, so packing the same
    /// tree twice yields the same bytes and the same hash.
    pub fn from_dir(dir: &Path) -> RecipeResult<Self> {
        let manifest_path = dir.join(RECIPE_MANIFEST_FILENAME);
        let manifest_bytes = std::fs::read(&manifest_path)?;
        let recipe_file = RecipeFile::from_slice(&manifest_path, &manifest_bytes)?;

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);
        builder.mode(HeaderMode::Deterministic);

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !e.file_name()
                    .to_str()
                    .is_some_and(|name| PACKAGE_IGNORED_ENTRIES.contains(&name))
            });
        for entry in walker {
            let entry = entry.map_err(|e| invalid(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| invalid(e.to_string()))?;
            // Tar paths always use forward slashes.
            let name = relative.to_string_lossy().replace('\\', "/");
            if entry.file_type().is_dir() {
                builder.append_dir(&name, entry.path())?;
            } else if entry.file_type().is_file() {
                builder.append_path_with_name(entry.path(), &name)?;
            } else {
                log::debug!("Skipping '{}' while packing: not a regular file", name);
            }
        }

        let bytes = builder.into_inner()?.finish()?;
        log::debug!("Packed '{}' ({} bytes)", dir.display(), bytes.len());
        Ok(Self::with_manifest(recipe_file, bytes))
    }

    /// Loads a `.tgz` file from disk.
    pub fn from_path(path: &Path) -> RecipeResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_tarball(bytes)
    }

    /// Wraps tarball bytes, reading the manifest out of them.
    pub fn from_tarball(bytes: Vec<u8>) -> RecipeResult<Self> {
        let recipe_file = read_manifest(&bytes)?;
        Ok(Self::with_manifest(recipe_file, bytes))
    }

    /// Fetches and wraps the tarball at `url`.
    pub async fn from_url(url: &str, downloader: &dyn Downloader) -> RecipeResult<Self> {
        let bytes = downloader.fetch(url).await?;
        Self::from_tarball(bytes)
    }

    fn with_manifest(recipe_file: RecipeFile, bytes: Vec<u8>) -> Self {
        let content_hash = content_hash(&bytes);
        Self {
            recipe_file,
            bytes,
            content_hash,
        }
    }

    /// The manifest packed in the tarball.
    pub fn manifest(&self) -> &RecipeFile {
        &self.recipe_file
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Writes the tarball to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> RecipeResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Unpacks the tarball into `dir`.
    ///
    /// Fails before writing anything if an entry would land outside `dir`.
    pub fn extract_to(&self, dir: &Path) -> RecipeResult<()> {
        let mut archive = Archive::new(GzDecoder::new(self.bytes.as_slice()));
        for entry in archive.entries()? {
            let path = entry?.path()?.into_owned();
            if !is_contained(&path) {
                return Err(invalid(format!(
                    "entry '{}' escapes the package root",
                    path.display()
                )));
            }
        }

        std::fs::create_dir_all(dir)?;
        let mut archive = Archive::new(GzDecoder::new(self.bytes.as_slice()));
        archive.set_preserve_permissions(true);
        for entry in archive.entries()? {
            entry?.unpack_in(dir)?;
        }
        log::debug!("Extracted '{}' into '{}'", self.recipe_file.name(), dir.display());
        Ok(())
    }
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn read_manifest(bytes: &[u8]) -> RecipeResult<RecipeFile> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    for entry in archive
        .entries()
        .map_err(|e| invalid(format!("unreadable tarball: {}", e)))?
    {
        let mut entry = entry.map_err(|e| invalid(format!("unreadable tarball: {}", e)))?;
        let path: PathBuf = entry
            .path()?
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if path == Path::new(RECIPE_MANIFEST_FILENAME) {
            let mut manifest = Vec::new();
            entry.read_to_end(&mut manifest)?;
            return RecipeFile::from_slice(&path, &manifest);
        }
    }
    Err(invalid(format!("no {} in package", RECIPE_MANIFEST_FILENAME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_recipe(dir: &Path) {
        fs::write(
            dir.join("recipe.json"),
            r#"{"name":"mylib","version":"1.0.0","main":"run.sh"}"#,
        )
        .unwrap();
        fs::write(dir.join("run.sh"), "echo hi\n").unwrap();
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("lib").join("util.sh"), "true\n").unwrap();
        fs::create_dir_all(dir.join("node_modules").join("x")).unwrap();
        fs::write(dir.join("node_modules").join("x").join("big.js"), "x").unwrap();
    }

    #[test]
    fn test_pack_and_extract() {
        let src = TempDir::new().unwrap();
        write_recipe(src.path());

        let package = RecipePackage::from_dir(src.path()).unwrap();
        assert_eq!(package.manifest().name(), "mylib");
        assert_eq!(package.content_hash().len(), 64);

        let out = TempDir::new().unwrap();
        package.extract_to(out.path()).unwrap();
        assert!(out.path().join("recipe.json").is_file());
        assert!(out.path().join("lib").join("util.sh").is_file());
        assert!(!out.path().join("node_modules").exists());
    }

    #[test]
    fn test_packing_is_deterministic() {
        let src = TempDir::new().unwrap();
        write_recipe(src.path());
        let a = RecipePackage::from_dir(src.path()).unwrap();
        let b = RecipePackage::from_dir(src.path()).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_from_tarball_reads_manifest_and_hash() {
        let src = TempDir::new().unwrap();
        write_recipe(src.path());
        let packed = RecipePackage::from_dir(src.path()).unwrap();

        let reread = RecipePackage::from_tarball(packed.bytes().to_vec()).unwrap();
        assert_eq!(reread.manifest().version(), "1.0.0");
        assert_eq!(reread.content_hash(), packed.content_hash());

        let out = TempDir::new().unwrap();
        let saved = out.path().join("cache").join("mylib.tgz");
        packed.save_to(&saved).unwrap();
        let loaded = RecipePackage::from_path(&saved).unwrap();
        assert_eq!(loaded.content_hash(), packed.content_hash());
    }

    #[test]
    fn test_from_dir_without_manifest_fails() {
        let src = TempDir::new().unwrap();
        let err = RecipePackage::from_dir(src.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_garbage_is_invalid_package() {
        let err = RecipePackage::from_tarball(b"not a tarball".to_vec()).unwrap_err();
        assert!(matches!(err, RecipeError::InvalidPackage { .. }));
    }

    #[test]
    fn test_parent_dir_components_are_rejected() {
        assert!(is_contained(Path::new("./lib/a.sh")));
        assert!(!is_contained(Path::new("../evil.sh")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}

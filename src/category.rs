/// File categorization by extension.
///
/// This module maps dot-prefixed file extensions (e.g. `.mp3`) to a fixed set of
/// categories and each category to the directory its files are moved into.
///
/// # Examples
///
/// ```
/// use dlsort::category::{Category, CategoryRegistry};
/// use std::path::Path;
///
/// let registry = CategoryRegistry::new(Path::new("/downloads"));
/// assert_eq!(registry.category_of(".MP3"), Category::Audio);
/// assert_eq!(registry.category_of(".unknown"), Category::Other);
/// assert_eq!(registry.directory_for(".png"), Path::new("/downloads/Images"));
/// ```
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const AUDIO_EXTENSIONS: &[&str] = &[
    ".3ga", ".aac", ".ac3", ".aif", ".aiff", ".alac", ".amr", ".ape", ".au", ".dss", ".flac",
    ".flv", ".m4a", ".m4b", ".m4p", ".mp3", ".mpga", ".ogg", ".oga", ".mogg", ".opus", ".qcp",
    ".tta", ".voc", ".wav", ".wma", ".wv", ".ra", ".mid", ".midi", ".pcm", ".aifc",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    ".webm", ".mts", ".m2ts", ".ts", ".mov", ".mp4", ".m4p", ".m4v", ".mxf", ".avi", ".mkv",
    ".flv", ".wmv", ".rmvb", ".3gp", ".vob", ".ogv", ".3g2",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".jfif", ".pjpeg", ".pjp", ".png", ".gif", ".webp", ".svg", ".apng",
    ".avif", ".bmp", ".ico", ".tiff", ".tif", ".heif", ".heic", ".raw", ".nef", ".cr2", ".orf",
    ".sr2", ".arw", ".rw2", ".dng", ".eps",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".doc", ".docx", ".log", ".msg", ".odt", ".pages", ".rtf", ".tex", ".txt", ".wpd", ".wps",
    ".indo", ".pct", ".pdf", ".xls", ".xlsx", ".csv", ".ppt", ".pptx", ".key", ".odp", ".ods",
    ".epub", ".mobi", ".ibooks", ".chm", ".xps",
];

const DATAFILE_EXTENSIONS: &[&str] = &[
    ".csv", ".dat", ".ged", ".key", ".keychain", ".ppt", ".pptx", ".sdf", ".tar", ".tax2016",
    ".tax2020", ".tax2021", ".vcf", ".xml", ".zip", ".rar", ".7z", ".gz", ".bz2", ".xz", ".iso",
    ".cab", ".dmg", ".tgz", ".pkg", ".rpm", ".deb",
];

const EXECUTABLE_EXTENSIONS: &[&str] = &[
    ".bat", ".bin", ".cmd", ".com", ".cpl", ".ex_", ".exe", ".gadget", ".inf1", ".ins", ".inx",
    ".isu", ".job", ".jse", ".lnk", ".msc", ".msi", ".msp", ".mst", ".paf", ".pif", ".ps1",
    ".reg", ".rgs", ".scr", ".sct", ".shb", ".shs", ".ws", ".wsf", ".wsh", ".py", ".jar", ".app",
    ".apk", ".run", ".sh", ".command",
];

/// A classification bucket for files.
///
/// The declaration order is also the lookup priority: when an extension belongs
/// to several categories, the earliest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Audio,
    Video,
    Image,
    Document,
    Datafile,
    Executable,
    /// Catch-all for everything no extension set claims.
    Other,
}

impl Category {
    /// Every category, in priority order.
    pub const ALL: [Category; 7] = [
        Category::Audio,
        Category::Video,
        Category::Image,
        Category::Document,
        Category::Datafile,
        Category::Executable,
        Category::Other,
    ];

    /// Returns the lowercase name used in configuration files and reports.
    ///
    /// ```
    /// use dlsort::category::Category;
    ///
    /// assert_eq!(Category::Datafile.name(), "datafile");
    /// ```
    pub fn name(&self) -> &'static str {
        match self {
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Image => "image",
            Category::Document => "document",
            Category::Datafile => "datafile",
            Category::Executable => "executable",
            Category::Other => "other",
        }
    }

    /// Returns the directory name used when the configuration does not set one.
    ///
    /// ```
    /// use dlsort::category::Category;
    ///
    /// assert_eq!(Category::Image.default_dir_name(), "Images");
    /// assert_eq!(Category::Other.default_dir_name(), "Others");
    /// ```
    pub fn default_dir_name(&self) -> &'static str {
        match self {
            Category::Audio => "Audios",
            Category::Video => "Videos",
            Category::Image => "Images",
            Category::Document => "Documents",
            Category::Datafile => "Datafiles",
            Category::Executable => "Executables",
            Category::Other => "Others",
        }
    }

    /// Returns the built-in extension set. `Other` has none.
    pub fn default_extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Audio => AUDIO_EXTENSIONS,
            Category::Video => VIDEO_EXTENSIONS,
            Category::Image => IMAGE_EXTENSIONS,
            Category::Document => DOCUMENT_EXTENSIONS,
            Category::Datafile => DATAFILE_EXTENSIONS,
            Category::Executable => EXECUTABLE_EXTENSIONS,
            Category::Other => &[],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unrecognised category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.name() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Returns the extension of a file name: everything from the last `.` onward,
/// or the empty string when there is no dot.
///
/// ```
/// use dlsort::category::extension_of;
///
/// assert_eq!(extension_of("archive.tar.gz"), ".gz");
/// assert_eq!(extension_of(".bashrc"), ".bashrc");
/// assert_eq!(extension_of("README"), "");
/// ```
pub fn extension_of(file_name: &str) -> &str {
    file_name.rfind('.').map_or("", |dot| &file_name[dot..])
}

/// Normalises a configured extension to the lowercase, dot-prefixed form.
///
/// Returns `None` for blank input.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext == "." {
        return None;
    }
    if ext.starts_with('.') {
        Some(ext)
    } else {
        Some(format!(".{ext}"))
    }
}

/// An extension claimed by more than one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOverlap {
    pub extension: String,
    /// The category lookups resolve to.
    pub winner: Category,
    /// The lower-priority category that never sees this extension.
    pub shadowed: Category,
}

impl fmt::Display for ExtensionOverlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extension '{}' is listed under both {} and {}; files will go to {}",
            self.extension, self.winner, self.shadowed, self.winner
        )
    }
}

/// Maps extensions to categories and categories to destination directories.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    directories: [PathBuf; 7],
    extensions: [HashSet<String>; 7],
    index: HashMap<String, Category>,
    overlaps: Vec<ExtensionOverlap>,
}

impl CategoryRegistry {
    /// Creates a registry with the built-in tables, placing every category
    /// directory directly under `root`.
    pub fn new(root: &Path) -> Self {
        let directories =
            std::array::from_fn(|i| root.join(Category::ALL[i].default_dir_name()));
        let extensions = std::array::from_fn(|i| {
            Category::ALL[i]
                .default_extensions()
                .iter()
                .filter_map(|ext| normalize_extension(ext))
                .collect()
        });

        let mut registry = Self {
            directories,
            extensions,
            index: HashMap::new(),
            overlaps: Vec::new(),
        };
        registry.reindex();
        registry
    }

    /// Replaces the destination directory of a category.
    pub fn with_directory(mut self, category: Category, dir: impl Into<PathBuf>) -> Self {
        self.directories[category.index()] = dir.into();
        self
    }

    /// Replaces the extension set of a category.
    ///
    /// Extensions are normalised; blank entries are dropped. `Other` never takes
    /// part in lookups, so a set given for it is kept but has no effect.
    pub fn with_extensions<I, S>(mut self, category: Category, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions[category.index()] = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self.reindex();
        self
    }

    fn reindex(&mut self) {
        self.index.clear();
        self.overlaps.clear();

        for category in Category::ALL {
            if category == Category::Other {
                continue;
            }
            let mut exts: Vec<&String> = self.extensions[category.index()].iter().collect();
            exts.sort();

            for ext in exts {
                match self.index.entry(ext.clone()) {
                    Entry::Occupied(existing) => self.overlaps.push(ExtensionOverlap {
                        extension: ext.clone(),
                        winner: *existing.get(),
                        shadowed: category,
                    }),
                    Entry::Vacant(slot) => {
                        slot.insert(category);
                    }
                }
            }
        }
    }

    /// Classifies an extension (dot included). Case-insensitive and total:
    /// anything unclaimed is `Other`.
    pub fn category_of(&self, extension: &str) -> Category {
        self.index
            .get(&extension.to_lowercase())
            .copied()
            .unwrap_or(Category::Other)
    }

    /// Returns the destination directory for files with this extension.
    pub fn directory_for(&self, extension: &str) -> &Path {
        self.directory(self.category_of(extension))
    }

    /// Returns the destination directory of a category.
    pub fn directory(&self, category: Category) -> &Path {
        &self.directories[category.index()]
    }

    /// Iterates over every category with its destination directory.
    pub fn directories(&self) -> impl Iterator<Item = (Category, &Path)> {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.directory(category)))
    }

    /// Returns the extension set of a category.
    pub fn extensions(&self, category: Category) -> &HashSet<String> {
        &self.extensions[category.index()]
    }

    /// Extensions listed under more than one category.
    pub fn overlaps(&self) -> &[ExtensionOverlap] {
        &self.overlaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CategoryRegistry {
        CategoryRegistry::new(Path::new("/dl"))
    }

    #[test]
    fn test_default_directories() {
        let registry = registry();
        assert_eq!(registry.directory(Category::Audio), Path::new("/dl/Audios"));
        assert_eq!(registry.directory(Category::Video), Path::new("/dl/Videos"));
        assert_eq!(registry.directory(Category::Image), Path::new("/dl/Images"));
        assert_eq!(
            registry.directory(Category::Document),
            Path::new("/dl/Documents")
        );
        assert_eq!(
            registry.directory(Category::Datafile),
            Path::new("/dl/Datafiles")
        );
        assert_eq!(
            registry.directory(Category::Executable),
            Path::new("/dl/Executables")
        );
        assert_eq!(registry.directory(Category::Other), Path::new("/dl/Others"));
        assert_eq!(registry.directories().count(), 7);
    }

    #[test]
    fn test_category_of_known_extensions() {
        let registry = registry();
        assert_eq!(registry.category_of(".mp3"), Category::Audio);
        assert_eq!(registry.category_of(".mkv"), Category::Video);
        assert_eq!(registry.category_of(".jpeg"), Category::Image);
        assert_eq!(registry.category_of(".pdf"), Category::Document);
        assert_eq!(registry.category_of(".zip"), Category::Datafile);
        assert_eq!(registry.category_of(".exe"), Category::Executable);
    }

    #[test]
    fn test_category_of_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.category_of(".MP3"), Category::Audio);
        assert_eq!(registry.category_of(".Jpg"), Category::Image);
        assert_eq!(registry.category_of(".PdF"), Category::Document);
    }

    #[test]
    fn test_category_of_is_total() {
        let registry = registry();
        for ext in ["", ".", ".xyz", ".UNKNOWN", "mp3", ".mp3.", "..", " .mp3"] {
            assert_eq!(registry.category_of(ext), Category::Other, "{ext:?}");
        }
        assert_eq!(registry.directory_for(""), Path::new("/dl/Others"));
    }

    #[test]
    fn test_overlaps_resolve_by_priority() {
        let registry = registry();
        assert_eq!(registry.category_of(".csv"), Category::Document);
        assert_eq!(registry.category_of(".pptx"), Category::Document);
        assert_eq!(registry.category_of(".flv"), Category::Audio);
        assert_eq!(registry.category_of(".m4p"), Category::Audio);
    }

    #[test]
    fn test_default_overlaps_are_reported() {
        let registry = registry();
        let overlapping: Vec<(&str, Category, Category)> = registry
            .overlaps()
            .iter()
            .map(|o| (o.extension.as_str(), o.winner, o.shadowed))
            .collect();

        assert_eq!(
            overlapping,
            vec![
                (".flv", Category::Audio, Category::Video),
                (".m4p", Category::Audio, Category::Video),
                (".csv", Category::Document, Category::Datafile),
                (".key", Category::Document, Category::Datafile),
                (".ppt", Category::Document, Category::Datafile),
                (".pptx", Category::Document, Category::Datafile),
            ]
        );
    }

    #[test]
    fn test_with_extensions_replaces_set_and_normalizes() {
        let registry = registry().with_extensions(Category::Document, ["PDF", ".Txt", "  "]);

        assert_eq!(registry.extensions(Category::Document).len(), 2);
        assert_eq!(registry.category_of(".pdf"), Category::Document);
        assert_eq!(registry.category_of(".TXT"), Category::Document);
        // No longer claimed by documents, so the datafile entry takes over.
        assert_eq!(registry.category_of(".csv"), Category::Datafile);
        assert_eq!(registry.category_of(".docx"), Category::Other);
    }

    #[test]
    fn test_other_extensions_are_ignored() {
        let registry = registry().with_extensions(Category::Other, [".weird"]);
        assert_eq!(registry.category_of(".weird"), Category::Other);
        assert!(registry.overlaps().iter().all(|o| o.extension != ".weird"));
    }

    #[test]
    fn test_with_directory() {
        let registry = registry().with_directory(Category::Image, "/pictures");
        assert_eq!(registry.directory_for(".png"), Path::new("/pictures"));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("audio".parse::<Category>(), Ok(Category::Audio));
        assert_eq!(" Executable ".parse::<Category>(), Ok(Category::Executable));
        assert_eq!(
            "music".parse::<Category>(),
            Err(UnknownCategory("music".to_string()))
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("song.mp3"), ".mp3");
        assert_eq!(extension_of("photo.JPG"), ".JPG");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("trailing."), ".");
        assert_eq!(extension_of("Makefile"), "");
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("MP3"), Some(".mp3".to_string()));
        assert_eq!(normalize_extension(".Flac"), Some(".flac".to_string()));
        assert_eq!(normalize_extension(" "), None);
        assert_eq!(normalize_extension("."), None);
    }
}

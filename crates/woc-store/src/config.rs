use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Placeholder substituted with the shard index in path templates.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Default bound on simultaneously open shard handles.
pub const DEFAULT_MAX_OPEN_HANDLES: usize = 1024;

/// A kind of data stored in the archive.
///
/// Every category is sharded into `2^prefix_bits` files described by a
/// [`ShardLayout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    CommitRandom,
    TreeRandom,
    BlobOffset,
    BlobData,
    TagData,
    CommitSequentialIdx,
    CommitSequentialBin,
    TreeSequentialIdx,
    TreeSequentialBin,
    CommitProjects,
    CommitChildren,
    CommitFiles,
    BlobCommits,
    BlobFiles,
    ProjectCommits,
    ProjectAuthors,
    AuthorCommits,
    AuthorProjects,
    AuthorFiles,
    FileCommits,
    FileAuthors,
    FileBlobs,
}

/// How a category's shard files are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Persistent hash-table files, one value per key.
    HashTable,
    /// Append-only content or index files read by offset or line.
    Sequential,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 22] = [
        Category::CommitRandom,
        Category::TreeRandom,
        Category::BlobOffset,
        Category::BlobData,
        Category::TagData,
        Category::CommitSequentialIdx,
        Category::CommitSequentialBin,
        Category::TreeSequentialIdx,
        Category::TreeSequentialBin,
        Category::CommitProjects,
        Category::CommitChildren,
        Category::CommitFiles,
        Category::BlobCommits,
        Category::BlobFiles,
        Category::ProjectCommits,
        Category::ProjectAuthors,
        Category::AuthorCommits,
        Category::AuthorProjects,
        Category::AuthorFiles,
        Category::FileCommits,
        Category::FileAuthors,
        Category::FileBlobs,
    ];

    /// Name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommitRandom => "commit_random",
            Self::TreeRandom => "tree_random",
            Self::BlobOffset => "blob_offset",
            Self::BlobData => "blob_data",
            Self::TagData => "tag_data",
            Self::CommitSequentialIdx => "commit_sequential_idx",
            Self::CommitSequentialBin => "commit_sequential_bin",
            Self::TreeSequentialIdx => "tree_sequential_idx",
            Self::TreeSequentialBin => "tree_sequential_bin",
            Self::CommitProjects => "commit_projects",
            Self::CommitChildren => "commit_children",
            Self::CommitFiles => "commit_files",
            Self::BlobCommits => "blob_commits",
            Self::BlobFiles => "blob_files",
            Self::ProjectCommits => "project_commits",
            Self::ProjectAuthors => "project_authors",
            Self::AuthorCommits => "author_commits",
            Self::AuthorProjects => "author_projects",
            Self::AuthorFiles => "author_files",
            Self::FileCommits => "file_commits",
            Self::FileAuthors => "file_authors",
            Self::FileBlobs => "file_blobs",
        }
    }

    pub fn storage(&self) -> Storage {
        match self {
            Self::BlobData
            | Self::TagData
            | Self::CommitSequentialIdx
            | Self::CommitSequentialBin
            | Self::TreeSequentialIdx
            | Self::TreeSequentialBin => Storage::Sequential,
            _ => Storage::HashTable,
        }
    }

    /// Categories whose absence means the object does not exist.
    pub fn is_essential(&self) -> bool {
        matches!(
            self,
            Self::CommitRandom | Self::TreeRandom | Self::BlobOffset
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| StoreError::Config(format!("unknown category: {s}")))
    }
}

impl TryFrom<String> for Category {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.name().to_string()
    }
}

/// Where a category's shards live and how many there are.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardLayout {
    /// Path template containing [`KEY_PLACEHOLDER`].
    pub template: String,
    /// The category has `2^prefix_bits` shards.
    pub prefix_bits: u8,
}

impl ShardLayout {
    pub fn new(template: impl Into<String>, prefix_bits: u8) -> Self {
        Self {
            template: template.into(),
            prefix_bits,
        }
    }

    /// Number of shard files.
    pub fn shard_count(&self) -> u64 {
        1u64 << self.prefix_bits
    }

    /// Path of shard `index`.
    pub fn path(&self, index: u32) -> PathBuf {
        PathBuf::from(self.template.replace(KEY_PLACEHOLDER, &index.to_string()))
    }
}

/// Archive layout injected into a [`ShardStore`](crate::ShardStore).
///
/// ```toml
/// max_open_handles = 512
///
/// [categories.commit_random]
/// template = "/fast/All.sha1c/commit_{key}.tch"
/// prefix_bits = 7
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Bound on shard handles kept open at once.
    pub max_open_handles: usize,
    /// Layout of every configured category.
    pub categories: BTreeMap<Category, ShardLayout>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
            categories: BTreeMap::new(),
        }
    }
}

impl ArchiveConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Every category under `root`, named `<category>_{key}.<ext>`, with the
    /// same number of shards.
    pub fn flat(root: impl AsRef<Path>, prefix_bits: u8) -> Self {
        let root = root.as_ref();
        let categories = Category::ALL
            .iter()
            .map(|&category| {
                let ext = match category {
                    Category::CommitSequentialIdx | Category::TreeSequentialIdx => "idx",
                    _ if category.storage() == Storage::Sequential => "bin",
                    _ => "tch",
                };
                let file = format!("{}_{KEY_PLACEHOLDER}.{ext}", category.name());
                let template = root.join(file).to_string_lossy().into_owned();
                (category, ShardLayout::new(template, prefix_bits))
            })
            .collect();
        Self {
            categories,
            ..Self::default()
        }
    }

    /// Add or replace one category's layout.
    pub fn with_layout(mut self, category: Category, layout: ShardLayout) -> Self {
        self.categories.insert(category, layout);
        self
    }

    pub fn with_max_open_handles(mut self, max_open_handles: usize) -> Self {
        self.max_open_handles = max_open_handles;
        self
    }

    pub fn layout(&self, category: Category) -> StoreResult<&ShardLayout> {
        self.categories
            .get(&category)
            .ok_or(StoreError::UnconfiguredCategory(category))
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.max_open_handles == 0 {
            return Err(StoreError::Config(
                "max_open_handles must be at least 1".into(),
            ));
        }
        for (category, layout) in &self.categories {
            if !layout.template.contains(KEY_PLACEHOLDER) {
                return Err(StoreError::Config(format!(
                    "template for {category} lacks {KEY_PLACEHOLDER}"
                )));
            }
            if layout.prefix_bits > 32 {
                return Err(StoreError::Config(format!(
                    "prefix_bits for {category} exceeds 32"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ArchiveConfig::default();
        assert_eq!(c.max_open_handles, 1024);
        assert!(c.categories.is_empty());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn category_names_parse_back() {
        for category in Category::ALL {
            assert_eq!(category.name().parse::<Category>().unwrap(), category);
        }
        assert!("commit_parents".parse::<Category>().is_err());
    }

    #[test]
    fn storage_kinds() {
        assert_eq!(Category::CommitRandom.storage(), Storage::HashTable);
        assert_eq!(Category::FileBlobs.storage(), Storage::HashTable);
        assert_eq!(Category::BlobData.storage(), Storage::Sequential);
        assert_eq!(Category::TreeSequentialIdx.storage(), Storage::Sequential);
        assert!(Category::BlobOffset.is_essential());
        assert!(!Category::ProjectCommits.is_essential());
    }

    #[test]
    fn layout_paths() {
        let layout = ShardLayout::new("/data/c2pFullU.{key}.tch", 5);
        assert_eq!(layout.shard_count(), 32);
        assert_eq!(layout.path(17), PathBuf::from("/data/c2pFullU.17.tch"));
    }

    #[test]
    fn parse_toml() {
        let text = r#"
            max_open_handles = 16

            [categories.commit_random]
            template = "/fast/commit_{key}.tch"
            prefix_bits = 7

            [categories.project_commits]
            template = "/basemaps/p2cFullU.{key}.tch"
            prefix_bits = 5
        "#;
        let c = ArchiveConfig::from_toml_str(text).unwrap();
        assert_eq!(c.max_open_handles, 16);
        assert_eq!(c.layout(Category::CommitRandom).unwrap().prefix_bits, 7);
        assert!(matches!(
            c.layout(Category::BlobData),
            Err(StoreError::UnconfiguredCategory(Category::BlobData))
        ));
    }

    #[test]
    fn handle_limit_defaults_when_omitted() {
        let c = ArchiveConfig::from_toml_str("").unwrap();
        assert_eq!(c.max_open_handles, DEFAULT_MAX_OPEN_HANDLES);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let text = r#"
            [categories.commit_parents]
            template = "/x/{key}.tch"
            prefix_bits = 1
        "#;
        assert!(matches!(
            ArchiveConfig::from_toml_str(text),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn zero_handle_limit_is_rejected() {
        assert!(matches!(
            ArchiveConfig::from_toml_str("max_open_handles = 0"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let c = ArchiveConfig::default()
            .with_layout(Category::TreeRandom, ShardLayout::new("/fast/tree.tch", 3));
        assert!(matches!(c.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn toml_round_trip() {
        let c = ArchiveConfig::flat("/archive", 2).with_max_open_handles(8);
        let text = c.to_toml_string().unwrap();
        assert_eq!(ArchiveConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.toml");
        std::fs::write(
            &path,
            "[categories.blob_offset]\ntemplate = \"/o/sha1.blob_{key}.tch\"\nprefix_bits = 7\n",
        )
        .unwrap();
        let c = ArchiveConfig::load(&path).unwrap();
        assert_eq!(
            c.layout(Category::BlobOffset).unwrap().path(3),
            PathBuf::from("/o/sha1.blob_3.tch")
        );
    }

    #[test]
    fn flat_layout_extensions() {
        let c = ArchiveConfig::flat("/a", 0);
        assert_eq!(c.categories.len(), Category::ALL.len());
        assert_eq!(
            c.layout(Category::CommitSequentialIdx).unwrap().path(0),
            PathBuf::from("/a/commit_sequential_idx_0.idx")
        );
        assert_eq!(
            c.layout(Category::BlobData).unwrap().path(0),
            PathBuf::from("/a/blob_data_0.bin")
        );
        assert_eq!(
            c.layout(Category::AuthorFiles).unwrap().path(0),
            PathBuf::from("/a/author_files_0.tch")
        );
    }
}

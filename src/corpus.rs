use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::api_types::ApiPost;
use crate::error::{PlannerError, PlannerResult};
use crate::models::{Category, IndexedPost};

pub trait CorpusProvider: Send + Sync {
    fn load_posts(&self) -> PlannerResult<Vec<IndexedPost>>;
}

fn make_post_id(channel: &str, published_at: &str, text: &str) -> String {
    format!("{:016x}", xxh3_64(format!("{}|{}|{}", channel, published_at, text).as_bytes()))
}

/// `<root>/own/*.json` and `<root>/similar/*.json`, each a JSON array of [`ApiPost`].
pub struct DirectoryCorpus {
    root: PathBuf,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn json_files(dir: &Path) -> PlannerResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            warn!("Corpus directory missing - {}", dir.display());
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|x| x == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn load_file(path: &Path, category: Category) -> PlannerResult<Vec<IndexedPost>> {
        let schema_err = |reason: String| PlannerError::CorpusSchema {
            source_name: path.display().to_string(),
            reason,
        };
        let bytes = std::fs::read(path)?;
        let records: Vec<ApiPost> =
            serde_json::from_slice(&bytes).map_err(|e| schema_err(e.to_string()))?;

        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let channel = r.channel.trim().to_string();
                if channel.is_empty() {
                    return Err(schema_err(format!("record {} has an empty channel", i)));
                }
                let text = r.text.trim().to_string();
                let id = r
                    .id
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| make_post_id(&channel, &r.published_at, &text));
                Ok(IndexedPost {
                    id,
                    channel,
                    category,
                    published_at: r.published_at,
                    text,
                    metrics: r.metrics,
                })
            })
            .collect()
    }
}

impl CorpusProvider for DirectoryCorpus {
    fn load_posts(&self) -> PlannerResult<Vec<IndexedPost>> {
        let start = std::time::Instant::now();
        let mut posts = Vec::new();
        for (sub, category) in [("own", Category::Own), ("similar", Category::Similar)] {
            for file in Self::json_files(&self.root.join(sub))? {
                let loaded = Self::load_file(&file, category)?;
                debug!("Loaded corpus file - {} ({} posts)", file.display(), loaded.len());
                posts.extend(loaded);
            }
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = posts.iter().find(|p| !seen.insert(p.id.as_str())) {
            return Err(PlannerError::CorpusSchema {
                source_name: self.root.display().to_string(),
                reason: format!("duplicate post id {}", dup.id),
            });
        }

        info!(
            "Corpus loaded - duration={:.2}s, posts={}, root={}",
            start.elapsed().as_secs_f32(),
            posts.len(),
            self.root.display()
        );
        Ok(posts)
    }
}

/// Looks posts up by id, preserving the order of `ids` and skipping unknown ones.
pub fn posts_by_ids<'a>(posts: &'a [IndexedPost], ids: &[String]) -> Vec<&'a IndexedPost> {
    ids.iter()
        .filter_map(|id| posts.iter().find(|p| &p.id == id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn category_comes_from_directory_and_order_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "similar/b.json", r#"[{"id":"s2","channel":"beta","published_at":"2026-01-02","text":"two"}]"#);
        write(tmp.path(), "similar/a.json", r#"[{"id":"s1","channel":"alpha","date":"2026-01-01","text":" one ","metrics":{"reactions":5}}]"#);
        write(tmp.path(), "own/posts.json", r#"[{"channel":"me","published_at":"2026-01-03","text":"mine"}]"#);
        write(tmp.path(), "own/notes.txt", "ignored");

        let posts = DirectoryCorpus::new(tmp.path()).load_posts().unwrap();

        let summary: Vec<(&str, Category)> =
            posts.iter().map(|p| (p.channel.as_str(), p.category)).collect();
        assert_eq!(
            summary,
            vec![("me", Category::Own), ("alpha", Category::Similar), ("beta", Category::Similar)]
        );
        assert_eq!(posts[1].text, "one");
        assert_eq!(posts[1].published_at, "2026-01-01");
        assert_eq!(posts[1].reactions(), 5.0);
        assert_eq!(posts[0].id.len(), 16);
    }

    #[test]
    fn malformed_file_names_the_source() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "similar/broken.json", r#"{"not":"a list"}"#);

        let err = DirectoryCorpus::new(tmp.path()).load_posts().unwrap_err();
        assert_eq!(err.code(), "corpus_schema_error");
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "similar/a.json", r#"[{"id":"x","channel":"a","text":"1"},{"id":"x","channel":"b","text":"2"}]"#);
        let err = DirectoryCorpus::new(tmp.path()).load_posts().unwrap_err();
        assert!(err.to_string().contains("duplicate post id x"));
    }

    #[test]
    fn posts_by_ids_keeps_requested_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "similar/a.json", r#"[{"id":"a","channel":"c","text":"1"},{"id":"b","channel":"c","text":"2"}]"#);
        let posts = DirectoryCorpus::new(tmp.path()).load_posts().unwrap();
        let got = posts_by_ids(&posts, &["b".into(), "zzz".into(), "a".into()]);
        assert_eq!(got.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
    }
}

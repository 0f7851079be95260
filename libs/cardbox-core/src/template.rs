//! Template compilation with a content-addressed cache.
//!
//! Compiled matchers are memoized keyed by a hash of the template content
//! (name, pattern, flags, field mappings). Identical template content always
//! hashes to the same key, so a changed template simply produces a new key
//! and the stale entry ages out — the cache can never return a stale matcher
//! for changed content.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexBuilder};
use sha2::{Digest, Sha256};

use crate::error::{ExtractError, Result};
use crate::types::Template;

/// A compiled template held by (and cloned out of) the cache.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub template_hash: String,
    pub matcher: Arc<Regex>,
    pub compiled_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub use_count: u64,
}

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries beyond this are evicted oldest-by-`last_used_at` first.
    pub max_size: usize,
    /// Entries older than this (since compilation) are removed by
    /// [`TemplateCompiler::clear_expired`].
    pub max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 64,
            max_age: Duration::hours(1),
        }
    }
}

/// Compiles templates into executable matchers, memoizing by content hash.
#[derive(Debug, Default)]
pub struct TemplateCompiler {
    cache: Mutex<HashMap<String, CompiledTemplate>>,
    config: CacheConfig,
}

impl TemplateCompiler {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Deterministic content hash over `{name, pattern, flags, field_mappings}`.
    ///
    /// Transient fields (use counts, timestamps) are deliberately excluded so
    /// semantically-identical templates collapse to one cache entry.
    pub fn template_hash(template: &Template) -> String {
        let mut hasher = Sha256::new();
        hasher.update(template.name.as_bytes());
        hasher.update([0]);
        hasher.update(template.pattern.as_bytes());
        hasher.update([0]);
        hasher.update(template.flags.as_bytes());
        for (field, group) in &template.field_mappings {
            hasher.update([0]);
            hasher.update(field.as_bytes());
            hasher.update(group.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Get the compiled matcher for `template`, compiling on first use.
    ///
    /// On a hit, bumps `use_count` and `last_used_at`. On a miss, compiles
    /// outside the cache lock; two callers racing on the same key may both
    /// compile, which wastes work but stays correct since compiled templates
    /// are pure functions of their content.
    pub fn get_compiled(&self, template: &Template) -> Result<CompiledTemplate> {
        let hash = Self::template_hash(template);

        {
            let mut cache = lock_cache(&self.cache);
            if let Some(entry) = cache.get_mut(&hash) {
                entry.use_count += 1;
                entry.last_used_at = Utc::now();
                return Ok(entry.clone());
            }
        }

        let matcher = Arc::new(compile_pattern(template)?);
        let now = Utc::now();
        let entry = CompiledTemplate {
            template_hash: hash.clone(),
            matcher,
            compiled_at: now,
            last_used_at: now,
            use_count: 1,
        };

        let mut cache = lock_cache(&self.cache);
        let entry = cache.entry(hash).or_insert(entry).clone();
        evict_over_capacity(&mut cache, self.config.max_size);
        Ok(entry)
    }

    /// Compile ahead of time without using the result.
    pub fn precompile(&self, template: &Template) -> Result<()> {
        self.get_compiled(template).map(|_| ())
    }

    /// Remove entries older than the configured max age.
    ///
    /// Returns the number of entries removed. Intended for a background
    /// sweep; correctness never depends on it running.
    pub fn clear_expired(&self) -> usize {
        let cutoff = Utc::now() - self.config.max_age;
        let mut cache = lock_cache(&self.cache);
        let before = cache.len();
        cache.retain(|_, entry| entry.compiled_at >= cutoff);
        let removed = before - cache.len();
        if removed > 0 {
            tracing::debug!(removed, "expired compiled templates removed");
        }
        removed
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        lock_cache(&self.cache).clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        lock_cache(&self.cache).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compile a template's pattern, translating its flag characters.
fn compile_pattern(template: &Template) -> Result<Regex> {
    let mut builder = RegexBuilder::new(&template.pattern);
    for flag in template.flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            // `u` (unicode) is the regex crate's default; everything else is
            // rejected up front rather than silently ignored.
            'u' => &mut builder,
            other => {
                return Err(ExtractError::TemplateCompile {
                    name: template.name.clone(),
                    message: format!("unsupported flag '{other}'"),
                })
            }
        };
    }

    builder.build().map_err(|e| ExtractError::TemplateCompile {
        name: template.name.clone(),
        message: e.to_string(),
    })
}

/// A poisoned lock only means another thread panicked mid-insert; the map
/// itself is still usable, so recover the guard instead of propagating.
fn lock_cache(
    cache: &Mutex<HashMap<String, CompiledTemplate>>,
) -> std::sync::MutexGuard<'_, HashMap<String, CompiledTemplate>> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn evict_over_capacity(cache: &mut HashMap<String, CompiledTemplate>, max_size: usize) {
    while cache.len() > max_size {
        let oldest = cache
            .iter()
            .min_by_key(|(_, entry)| entry.last_used_at)
            .map(|(hash, _)| hash.clone());
        match oldest {
            Some(hash) => {
                cache.remove(&hash);
                tracing::debug!(%hash, "evicted compiled template over capacity");
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FIELD_QUESTION;
    use pretty_assertions::assert_eq;

    fn qa_template(name: &str, pattern: &str) -> Template {
        Template::question_answer(name, pattern)
    }

    #[test]
    fn identical_content_hashes_identically() {
        let a = qa_template("qa", r"## (.+)\n([\s\S]*)");
        let b = qa_template("qa", r"## (.+)\n([\s\S]*)");
        assert_eq!(
            TemplateCompiler::template_hash(&a),
            TemplateCompiler::template_hash(&b)
        );
    }

    #[test]
    fn changed_pattern_changes_hash() {
        let a = qa_template("qa", r"## (.+)");
        let b = qa_template("qa", r"### (.+)");
        assert_ne!(
            TemplateCompiler::template_hash(&a),
            TemplateCompiler::template_hash(&b)
        );
    }

    #[test]
    fn mappings_participate_in_hash() {
        let a = qa_template("qa", r"(.+)");
        let mut b = a.clone();
        b.field_mappings.insert(FIELD_QUESTION.to_string(), 2);
        assert_ne!(
            TemplateCompiler::template_hash(&a),
            TemplateCompiler::template_hash(&b)
        );
    }

    #[test]
    fn second_call_is_a_hit() {
        let compiler = TemplateCompiler::default();
        let template = qa_template("qa", r"## (.+)\n([\s\S]*)");

        let first = compiler.get_compiled(&template).unwrap();
        let second = compiler.get_compiled(&template).unwrap();

        assert_eq!(first.use_count, 1);
        assert_eq!(second.use_count, 2);
        assert_eq!(first.template_hash, second.template_hash);
        assert_eq!(compiler.len(), 1);
    }

    #[test]
    fn invalid_pattern_surfaces_compile_error() {
        let compiler = TemplateCompiler::default();
        let template = qa_template("broken", r"([unclosed");
        let err = compiler.get_compiled(&template).unwrap_err();
        assert!(matches!(err, ExtractError::TemplateCompile { .. }));
        assert!(compiler.is_empty());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let compiler = TemplateCompiler::default();
        let mut template = qa_template("flagged", r"(.+)");
        template.flags = "g".to_string();
        let err = compiler.get_compiled(&template).unwrap_err();
        assert!(matches!(err, ExtractError::TemplateCompile { .. }));
    }

    #[test]
    fn flags_translate_to_regex_behavior() {
        let compiler = TemplateCompiler::default();
        let mut template = qa_template("ci", r"^q: (.+)$");
        template.flags = "im".to_string();
        let compiled = compiler.get_compiled(&template).unwrap();
        assert!(compiled.matcher.is_match("prefix\nQ: hello"));
    }

    #[test]
    fn capacity_eviction_drops_least_recent() {
        let compiler = TemplateCompiler::new(CacheConfig {
            max_size: 2,
            max_age: Duration::hours(1),
        });

        for i in 0..3 {
            let template = qa_template(&format!("t{i}"), &format!("(pattern{i})"));
            compiler.precompile(&template).unwrap();
        }
        assert_eq!(compiler.len(), 2);
    }

    #[test]
    fn clear_expired_respects_max_age() {
        let compiler = TemplateCompiler::new(CacheConfig {
            max_size: 16,
            max_age: Duration::hours(1),
        });
        compiler.precompile(&qa_template("fresh", r"(.+)")).unwrap();

        // Nothing is older than an hour yet.
        assert_eq!(compiler.clear_expired(), 0);
        assert_eq!(compiler.len(), 1);
    }
}

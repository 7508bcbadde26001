use lru::LruCache;
use rustc_hash::FxBuildHasher;
use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::artifact::AutomatonArtifact;
use super::automaton::MergeAutomaton;
use super::bpe::byte_pair_encode_append;
use super::decoder::Decoder;
use super::error::{LoadError, TokenizerError};
use super::merges::MergeTable;
use super::options::{DecodeOptions, TokenizerOptions};
use super::pretokenizer::PreTokenizer;
use super::special::{Segment, SpecialTokens};
use super::vocab::Vocabulary;

/// Everything both encoders share: vocabulary, merge rules, special tokens
/// and options.
///
/// Immutable once built. Tokenizers hold it behind an `Arc`, so a reference
/// and a fast tokenizer built from one model share its tables.
#[derive(Debug)]
pub struct BpeModel {
    vocab: Vocabulary,
    merges: MergeTable,
    specials: SpecialTokens,
    pretokenizer: PreTokenizer,
    options: TokenizerOptions,
}

impl BpeModel {
    pub fn new(
        vocab: Vocabulary,
        merges: MergeTable,
        options: TokenizerOptions,
    ) -> Result<Self, LoadError> {
        let vocab = vocab.with_unk_token(options.unk_token.as_deref())?;
        let specials = SpecialTokens::resolve(&options.special_tokens, &vocab)?;

        let missing = merges
            .iter()
            .filter(|pair| !vocab.contains(&format!("{}{}", pair.left, pair.right)))
            .count();
        if missing > 0 {
            log::warn!("{missing} merge results are not in the vocabulary");
        }

        log::info!(
            "loaded BPE model: {} tokens, {} merges, {} special tokens",
            vocab.len(),
            merges.live_len(),
            specials.len()
        );

        Ok(Self {
            vocab,
            merges,
            specials,
            pretokenizer: PreTokenizer,
            options,
        })
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn merges(&self) -> &MergeTable {
        &self.merges
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.specials
    }

    pub fn pretokenizer(&self) -> &PreTokenizer {
        &self.pretokenizer
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.vocab, &self.specials, self.options.unknown_ids)
    }

    /// Whether `id` belongs to a special token.
    pub fn is_special(&self, id: u32) -> bool {
        self.specials.get(id).is_some()
    }

    /// Number of id slots, i.e. the largest id in use plus one.
    pub fn vocab_size(&self) -> usize {
        let max_id = self.vocab.max_id().max(self.specials.max_id());
        max_id.map_or(0, |id| id as usize + 1)
    }

    /// Input as the pre-tokenizer should see it.
    fn prepare<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let needs_space = self.options.add_prefix_space
            && text.chars().next().is_some_and(|ch| !ch.is_whitespace());
        if needs_space {
            Cow::Owned(format!(" {text}"))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Text ↔ id conversion, shared by the reference and fast tokenizers.
///
/// Implementors supply chunk-level BPE; everything else is provided.
pub trait TokenEncoder: Send + Sync {
    fn model(&self) -> &BpeModel;

    /// Run BPE over one pre-token chunk, appending the ids to `out`.
    ///
    /// On error `out` is left as it was.
    fn encode_append_chunk(&self, chunk: &str, out: &mut Vec<u32>) -> Result<(), TokenizerError>;

    /// Encode a single pre-token chunk.
    ///
    /// A chunk that is exactly a special token yields that token's id.
    fn encode_chunk(&self, chunk: &str) -> Result<Vec<u32>, TokenizerError> {
        if let Some(id) = self.model().special_tokens().id_of(chunk) {
            return Ok(vec![id]);
        }
        let mut out = Vec::new();
        self.encode_append_chunk(chunk, &mut out)?;
        Ok(out)
    }

    /// Encode text to ids.
    ///
    /// Special tokens are matched first and emitted as single ids; the text
    /// between them is pre-tokenized and encoded chunk by chunk.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(len = text.len())))]
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let model = self.model();
        let text = model.prepare(text);
        let mut out = Vec::with_capacity(text.len() / 3 + 1);

        for segment in model.special_tokens().split(&text) {
            match segment {
                Segment::Special(id) => out.push(id),
                Segment::Text(piece) => {
                    for chunk in model.pretokenizer().chunks(piece) {
                        self.encode_append_chunk(chunk, &mut out)?;
                    }
                }
            }
        }

        Ok(out)
    }

    /// Encode several texts, in order.
    fn encode_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<u32>>, TokenizerError>
    where
        Self: Sized,
    {
        texts.iter().map(|text| self.encode(text.as_ref())).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(ids = ids.len())))]
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.model().decoder().decode(ids)
    }

    fn decode_with(&self, ids: &[u32], opts: &DecodeOptions) -> Result<String, TokenizerError> {
        self.model().decoder().decode_with(ids, opts)
    }

    /// Decode to raw bytes without UTF-8 validation.
    fn decode_bytes(&self, ids: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        self.model().decoder().decode_bytes(ids)
    }

    /// Decode, replacing invalid UTF-8 with U+FFFD.
    fn decode_lossy(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.model().decoder().decode_lossy(ids)
    }

    /// Raw bytes of one token.
    fn token_bytes(&self, id: u32) -> Result<Vec<u8>, TokenizerError> {
        self.model().decoder().token_bytes(id)
    }

    fn vocab_size(&self) -> usize {
        self.model().vocab_size()
    }

    fn is_special(&self, id: u32) -> bool {
        self.model().is_special(id)
    }
}

type Lru = LruCache<Box<str>, Vec<u32>, FxBuildHasher>;

/// Per-instance LRU cache of encoded chunks.
///
/// Capacity 0 disables it, so the default configuration takes no locks.
struct ChunkCache {
    capacity: usize,
    inner: Option<Mutex<Lru>>,
}

impl ChunkCache {
    fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity)
            .map(|cap| Mutex::new(LruCache::with_hasher(cap, FxBuildHasher)));
        Self { capacity, inner }
    }

    /// Append the cached ids of `chunk`, or compute, cache and append them.
    fn encode_append(
        &self,
        chunk: &str,
        out: &mut Vec<u32>,
        encode: impl FnOnce(&mut Vec<u32>) -> Result<(), TokenizerError>,
    ) -> Result<(), TokenizerError> {
        let Some(inner) = &self.inner else {
            return encode(out);
        };

        if let Ok(mut cache) = inner.lock() {
            if let Some(cached) = cache.get(chunk) {
                out.extend_from_slice(cached);
                return Ok(());
            }
        }

        let start = out.len();
        encode(out)?;

        if let Ok(mut cache) = inner.lock() {
            cache.put(chunk.into(), out[start..].to_vec());
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|inner| inner.lock().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    fn clear(&self) {
        if let Some(Ok(mut cache)) = self.inner.as_ref().map(|inner| inner.lock()) {
            cache.clear();
        }
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl Clone for ChunkCache {
    /// Clones start with an empty cache of the same capacity.
    fn clone(&self) -> Self {
        Self::new(self.capacity)
    }
}

/// The reference tokenizer: iterative best-pair merging over strings.
///
/// Slow but simple; it defines the ids every other encoder must produce.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    model: Arc<BpeModel>,
    cache: ChunkCache,
}

impl Tokenizer {
    pub fn new(
        vocab: Vocabulary,
        merges: MergeTable,
        options: TokenizerOptions,
    ) -> Result<Self, LoadError> {
        Ok(Self::from_model(Arc::new(BpeModel::new(vocab, merges, options)?)))
    }

    pub fn from_model(model: Arc<BpeModel>) -> Self {
        let cache = ChunkCache::new(model.options().cache_size);
        Self { model, cache }
    }

    /// Load `vocab.json` and `merges.txt` from disk.
    pub fn from_files(
        vocab_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
        options: TokenizerOptions,
    ) -> Result<Self, LoadError> {
        let vocab = Vocabulary::from_file(vocab_path)?;
        let merges = MergeTable::from_file(merges_path)?;
        Self::new(vocab, merges, options)
    }

    pub fn shared_model(&self) -> &Arc<BpeModel> {
        &self.model
    }

    /// Clear the chunk cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached chunks.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl TokenEncoder for Tokenizer {
    fn model(&self) -> &BpeModel {
        &self.model
    }

    fn encode_append_chunk(&self, chunk: &str, out: &mut Vec<u32>) -> Result<(), TokenizerError> {
        let model = &*self.model;
        self.cache.encode_append(chunk, out, |out| {
            byte_pair_encode_append(chunk.as_bytes(), model.merges(), model.vocab(), out)
        })
    }
}

/// The fast tokenizer: merges run over a precompiled automaton.
///
/// Produces exactly the ids of [`Tokenizer`] for every input. The automaton
/// is never modified; [`FastTokenizer::rebuild`] returns a new instance.
#[derive(Debug, Clone)]
pub struct FastTokenizer {
    model: Arc<BpeModel>,
    automaton: Arc<MergeAutomaton>,
    cache: ChunkCache,
}

impl FastTokenizer {
    /// Compile the automaton for `merges` and build a tokenizer.
    pub fn new(
        vocab: Vocabulary,
        merges: MergeTable,
        options: TokenizerOptions,
    ) -> Result<Self, LoadError> {
        let model = Arc::new(BpeModel::new(vocab, merges, options)?);
        Ok(Self::from_model(model))
    }

    pub fn from_model(model: Arc<BpeModel>) -> Self {
        let automaton = Arc::new(MergeAutomaton::compile(model.merges(), model.vocab()));
        Self::with_automaton(model, automaton)
    }

    /// Build a fast tokenizer sharing the model of a reference tokenizer.
    pub fn from_reference(reference: &Tokenizer) -> Self {
        Self::from_model(Arc::clone(reference.shared_model()))
    }

    /// Build from raw artifacts plus a precompiled automaton.
    ///
    /// The artifact must have been built from exactly `vocab` and `merges`.
    /// Special tokens and the unknown token come from the artifact unless
    /// `options` declares its own, in which case the two must agree.
    pub fn from_artifact(
        vocab: Vocabulary,
        merges: MergeTable,
        artifact: AutomatonArtifact,
        mut options: TokenizerOptions,
    ) -> Result<Self, LoadError> {
        artifact.check_inputs(&vocab, &merges)?;

        if options.special_tokens.is_empty() {
            options.special_tokens = artifact.special_tokens.clone();
        }
        if options.unk_token.is_none() {
            options.unk_token = artifact.unk_token.clone();
        }
        if options.unk_token != artifact.unk_token {
            return Err(LoadError::ArtifactMismatch("unknown token"));
        }

        let model = BpeModel::new(vocab, merges, options)?;
        if model.special_tokens().tokens() != artifact.special_tokens.as_slice() {
            return Err(LoadError::ArtifactMismatch("special tokens"));
        }

        let automaton = artifact.into_automaton(model.vocab(), model.merges())?;
        Ok(Self::with_automaton(Arc::new(model), Arc::new(automaton)))
    }

    /// Load `vocab.json`, `merges.txt` and an automaton artifact from disk.
    pub fn from_files(
        vocab_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
        automaton_path: impl AsRef<Path>,
        options: TokenizerOptions,
    ) -> Result<Self, LoadError> {
        let vocab = Vocabulary::from_file(vocab_path)?;
        let merges = MergeTable::from_file(merges_path)?;
        let artifact = AutomatonArtifact::from_file(automaton_path)?;
        Self::from_artifact(vocab, merges, artifact, options)
    }

    fn with_automaton(model: Arc<BpeModel>, automaton: Arc<MergeAutomaton>) -> Self {
        let cache = ChunkCache::new(model.options().cache_size);
        Self {
            model,
            automaton,
            cache,
        }
    }

    /// Build a new tokenizer for different tables, keeping this one's options.
    pub fn rebuild(&self, vocab: Vocabulary, merges: MergeTable) -> Result<Self, LoadError> {
        Self::new(vocab, merges, self.model.options().clone())
    }

    pub fn automaton(&self) -> &MergeAutomaton {
        &self.automaton
    }

    pub fn shared_model(&self) -> &Arc<BpeModel> {
        &self.model
    }

    /// Snapshot of the compiled automaton and its inputs.
    pub fn to_artifact(&self) -> AutomatonArtifact {
        let model = &*self.model;
        AutomatonArtifact::new(
            model.vocab(),
            model.merges(),
            &self.automaton,
            model.special_tokens().tokens(),
            model.options().unk_token.as_deref(),
        )
    }

    pub fn to_artifact_json(&self) -> serde_json::Result<String> {
        self.to_artifact().to_json()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl TokenEncoder for FastTokenizer {
    fn model(&self) -> &BpeModel {
        &self.model
    }

    fn encode_append_chunk(&self, chunk: &str, out: &mut Vec<u32>) -> Result<(), TokenizerError> {
        let unk_id = self.model.vocab().unk_id();
        self.cache.encode_append(chunk, out, |out| {
            self.automaton.encode_append(chunk.as_bytes(), unk_id, out)
        })
    }
}

/// Build a reference tokenizer from `vocab.json` and `merges.txt` contents.
pub fn load(
    vocab_json: &[u8],
    merges_txt: &[u8],
    options: TokenizerOptions,
) -> Result<Tokenizer, LoadError> {
    let vocab = Vocabulary::from_json(vocab_json)?;
    let merges = MergeTable::from_bytes(merges_txt)?;
    Tokenizer::new(vocab, merges, options)
}

/// Build a fast tokenizer from `vocab.json`, `merges.txt` and automaton
/// artifact contents.
pub fn load_fast(
    vocab_json: &[u8],
    merges_txt: &[u8],
    automaton_json: &[u8],
    options: TokenizerOptions,
) -> Result<FastTokenizer, LoadError> {
    let vocab = Vocabulary::from_json(vocab_json)?;
    let merges = MergeTable::from_bytes(merges_txt)?;
    let artifact = AutomatonArtifact::from_json(automaton_json)?;
    FastTokenizer::from_artifact(vocab, merges, artifact, options)
}

use std::sync::LazyLock;

use bytepair::{
    AllowedSpecial, ErrorMode, GPT4_SPLIT_PATTERN, MergeTrainer, SpecialTokenTable, Tokenizer,
    TokenizerConfig,
};
use proptest::prelude::*;

const CORPUS: &str = "Hello world! Hello there, world. The world says hello back.\n\
    Numbers like 12345 and 2024 show up too, and so does ünïcödé text: café, naïve, 東京.\n\
    Repeat: hello hello hello world world world.";

fn gpt4_tokenizer() -> Tokenizer {
    let cfg = TokenizerConfig::new(400)
        .with_pattern(GPT4_SPLIT_PATTERN)
        .with_special_tokens(&SpecialTokenTable::cl100k());
    Tokenizer::train(&cfg, CORPUS).expect("training succeeds")
}

#[test]
fn test_roundtrip_edge_cases() {
    let tok = gpt4_tokenizer();
    for text in ["", "a", " ", "\n\n", "hello", "東京", "🦀 rust", CORPUS] {
        let chunks = tok.encode_ordinary(text).expect("text should be encodable");
        assert_eq!(tok.decode(&chunks, ErrorMode::Strict).expect("decodes"), text);

        let flat = tok.encode_ordinary_flat(text).expect("text should be encodable");
        assert_eq!(tok.decode_flat(&flat, ErrorMode::Strict).expect("decodes"), text);

        let bytes = tok.encode_bytes(text);
        assert_eq!(tok.decode_flat(&bytes, ErrorMode::Strict).expect("decodes"), text);
    }
}

#[test]
fn test_default_pattern_keeps_whitespace() {
    let tok = Tokenizer::train(&TokenizerConfig::new(300), "hello world hello world")
        .expect("training succeeds");
    for text in ["hello world", "  hello\tworld\n", " ", "a  b"] {
        let chunks = tok.encode_ordinary(text).expect("text should be encodable");
        assert_eq!(tok.decode(&chunks, ErrorMode::Strict).expect("decodes"), text);
    }
}

#[test]
fn test_classic_sequence_compresses() {
    let cfg = TokenizerConfig::new(259);
    let tok = Tokenizer::train(&cfg, "aaabdaaabac").expect("training succeeds");
    let tokens = tok
        .encode_ordinary_flat("aaabdaaabac")
        .expect("text should be encodable");
    assert_eq!(tokens, vec![258, 100, 258, 97, 99]);
    assert!(tokens.len() < "aaabdaaabac".len());
}

#[test]
fn test_encoding_training_text_matches_trainer_corpus() {
    let cfg = TokenizerConfig::new(350).with_pattern(GPT4_SPLIT_PATTERN);
    let (chunker, specials) = cfg.validate().expect("config is valid");

    let mut trainer = MergeTrainer::new(cfg.vocab_size, chunker.clone()).expect("valid size");
    let model = trainer.train(CORPUS).expect("training succeeds");
    let corpus = trainer.corpus_tokens();

    let tok = Tokenizer::new(model, chunker, specials).expect("tokenizer builds");
    assert_eq!(tok.encode_ordinary(CORPUS).expect("text should be encodable"), corpus);
}

#[test]
fn test_merge_ids_increase_in_training_order() {
    let tok = gpt4_tokenizer();
    let ids: Vec<_> = tok.merges().iter().map(|rule| rule.id).collect();
    assert!(!ids.is_empty());
    assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
    assert_eq!(ids[0], 256);

    let learned: Vec<_> = tok.learned_tokens().map(|(id, _)| id).collect();
    assert_eq!(learned, ids);
}

#[test]
fn test_early_termination_on_unique_pairs() {
    let tok =
        Tokenizer::train(&TokenizerConfig::new(10_000), "abcdefg").expect("training succeeds");
    assert_eq!(tok.num_merges(), 0);
    assert_eq!(tok.vocab_size(), 256);
    assert_eq!(
        tok.encode_ordinary_flat("abcdefg").expect("text should be encodable"),
        b"abcdefg".iter().map(|&b| u32::from(b)).collect::<Vec<_>>()
    );
}

#[test]
fn test_chunks_stay_isolated() {
    let tok = Tokenizer::train(&TokenizerConfig::new(300), "ab ab ab ba ba ba")
        .expect("training succeeds");
    let chunks = tok.encode_ordinary("ab ba").expect("text should be encodable");
    assert_eq!(chunks, vec![vec![256], vec![32], vec![257]]);
    for (id, bytes) in tok.learned_tokens() {
        assert!(!bytes.contains(&b' '), "token {id} spans whitespace");
    }
}

#[test]
fn test_batch_matches_sequential() {
    let tok = gpt4_tokenizer();
    let texts = ["hello world", "", "café<|endoftext|>", "12345 2024"];
    let batch = tok
        .encode_batch(&texts, &AllowedSpecial::All)
        .expect("texts should be batch-encodable");
    for (text, tokens) in texts.iter().zip(&batch) {
        assert_eq!(
            tokens,
            &tok.encode_flat(text, &AllowedSpecial::All).expect("text should be encodable")
        );
    }

    let seqs: Vec<&[u32]> = batch.iter().map(Vec::as_slice).collect();
    let decoded = tok.decode_batch(&seqs, ErrorMode::Strict).expect("decodes");
    assert_eq!(decoded, texts);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_roundtrip_any_string(text in "\\PC{0,64}") {
        static TOK: LazyLock<Tokenizer> = LazyLock::new(gpt4_tokenizer);
        let tok = &*TOK;
        let chunks = tok.encode_ordinary(&text).expect("text should be encodable");
        prop_assert_eq!(tok.decode(&chunks, ErrorMode::Strict).expect("decodes"), text);
    }

    #[test]
    fn prop_roundtrip_default_pattern(text in "\\PC{0,64}") {
        static TOK: LazyLock<Tokenizer> = LazyLock::new(|| {
            Tokenizer::train(&TokenizerConfig::new(400), CORPUS).expect("training succeeds")
        });
        let chunks = TOK.encode_ordinary(&text).expect("text should be encodable");
        prop_assert_eq!(TOK.decode(&chunks, ErrorMode::Strict).expect("decodes"), text);
    }
}

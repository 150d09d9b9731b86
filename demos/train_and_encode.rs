use std::error::Error;

use bytepair::{
    AllowedSpecial, ENDOFTEXT, ErrorMode, GPT4_SPLIT_PATTERN, SpecialTokenTable, Tokenizer,
    TokenizerConfig,
};
use env_logger::{Builder, Env};

const CORPUS: &str = "The quick brown fox jumps over the lazy dog. \
    The dog sleeps; the fox runs off into the forest. \
    Then the fox returns, and the dog and the fox are friends again.";

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cfg = TokenizerConfig::new(300)
        .with_pattern(GPT4_SPLIT_PATTERN)
        .with_special_tokens(&SpecialTokenTable::cl100k());
    let tok = Tokenizer::train(&cfg, CORPUS)?;

    println!("vocab size: {}", tok.vocab_size());
    for rule in tok.merges().iter().take(10) {
        println!("  {:<20} {:?}", rule.to_string(), tok.vocab().piece(rule.id)?);
    }

    let text = format!("the fox and the dog{ENDOFTEXT}");
    let tokens = tok.encode_flat(&text, &AllowedSpecial::All)?;
    println!("\n{text:?}\n -> {tokens:?} ({} bytes, {} tokens)", text.len(), tokens.len());

    let decoded = tok.decode_flat(&tokens, ErrorMode::Strict)?;
    assert_eq!(decoded, text);
    println!(" -> {decoded:?}");

    Ok(())
}

use bytepair::{ByteChunker, DEFAULT_PATTERN, MergeTrainer, TrainError};

fn main() -> Result<(), TrainError> {
    // Example: "aaabdaaabac"
    // (a, a) is merged first, then (aa, a) and finally (aaa, b).
    let chunker = ByteChunker::new(DEFAULT_PATTERN)?;
    let mut trainer = MergeTrainer::new(259, chunker)?;

    trainer.load("aaabdaaabac")?;
    println!("Initial: {:?}", trainer.corpus_tokens());

    while trainer.merge_step()? {
        if let Some(rule) = trainer.merges().last() {
            println!("{:<20} {:?}", rule.to_string(), trainer.corpus_tokens());
        }
    }

    println!("\nFinal state: {:?}", trainer.state());
    let model = trainer.model();
    for (id, bytes) in model.vocab().learned() {
        println!("{id}: {:?}", String::from_utf8_lossy(bytes));
    }

    Ok(())
}

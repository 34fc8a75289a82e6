use std::path::PathBuf;
use std::time::Instant;

use lexicon_tts::{Engine, EngineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(args.next().unwrap_or_else(|| "voice.json".to_string()));
    let text = args
        .next()
        .unwrap_or_else(|| "Привет! Сегодня мы летим в Tokyo.".to_string());

    let config = EngineConfig::from_json_file(&config_path)?;

    let load_start = Instant::now();
    let engine = Engine::from_config(&config)?;
    println!("Engine loaded in {:.2?}", load_start.elapsed());
    println!(
        "Vocabulary: {} symbols, lexicon: {} entries, speakers: {}",
        engine.vocabulary().len(),
        engine.lexicon().len(),
        engine.num_speakers()
    );
    for diagnostic in engine.diagnostics() {
        println!("lexicon: {diagnostic}");
    }

    let resolution = engine.resolve(&text);
    println!(
        "Resolved {} words from the lexicon, {} via the phonemizer, {} skipped",
        resolution.stats.lexicon_words,
        resolution.stats.phonemizer_words,
        resolution.stats.skipped_words
    );
    for skipped in &resolution.skipped {
        println!("skipped {:?}: {:?}", skipped.word, skipped.reason);
    }

    let synth_start = Instant::now();
    let audio = engine.synthesize(&text, config.speaker_id, config.speed)?;
    let synth_dur = synth_start.elapsed();

    let speedup = audio.duration_secs() / synth_dur.as_secs_f64();
    println!(
        "Synthesized {:.2}s audio in {:.2?} ({:.1}x real-time)",
        audio.duration_secs(),
        synth_dur,
        speedup
    );

    audio.write_wav(&PathBuf::from("output.wav"))?;
    println!("Saved to output.wav");
    Ok(())
}

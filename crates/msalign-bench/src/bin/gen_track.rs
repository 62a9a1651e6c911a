//! Writes a synthetic track as JSON to stdout.
//!
//! Usage: `gen-track [small|medium|large] [seed]`. Defaults to the small tier
//! with seed 42. The output feeds `msalign` directly:
//!
//! ```text
//! gen-track medium 7 > track.json && msalign plan track.json
//! ```

use std::error::Error;
use std::io::{BufWriter, Write};

use msalign_bench::{SizeTier, generate_track};

fn parse_tier(name: &str) -> Result<SizeTier, String> {
    match name.to_ascii_lowercase().as_str() {
        "small" | "s" => Ok(SizeTier::Small),
        "medium" | "m" => Ok(SizeTier::Medium),
        "large" | "l" => Ok(SizeTier::Large),
        other => Err(format!("unknown tier '{other}' (expected small, medium or large)")),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let tier = match args.next() {
        Some(name) => parse_tier(&name)?,
        None => SizeTier::Small,
    };
    let seed = match args.next() {
        Some(seed) => seed.parse::<u64>()?,
        None => 42,
    };

    let track = generate_track(&tier.config(seed));
    let references: usize = track.test_cases.iter().map(|tc| tc.reference.len()).sum();
    eprintln!(
        "Generated {} sources, {} test cases, {references} reference correspondences",
        track.sources.len(),
        track.test_cases.len()
    );

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    serde_json::to_writer(&mut out, &track)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

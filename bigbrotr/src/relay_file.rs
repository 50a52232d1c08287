use bigbrotr_model::Relay;

/// Parse one relay URL per line, skipping blank lines, `#`-prefixed comments, and lines that
/// fail `Relay::new` (logged and dropped rather than failing the whole load). Mirrors how
/// `src/initializer.py` and `src/priority_synchronizer.py` read `RELAYS_SEED_PATH` /
/// `PRIORITY_RELAYS_PATH`.
pub fn load_relay_file(path: &str) -> std::io::Result<Vec<Relay>> {
    let contents = std::fs::read_to_string(path)?;
    let mut relays = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Relay::new(line) {
            Ok(relay) => relays.push(relay),
            Err(err) => tracing::warn!(line, %err, "skipping unparseable relay line"),
        }
    }
    Ok(relays)
}

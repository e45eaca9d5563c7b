//! Configuration parsing tests: the shipped example must stay loadable.

fn parse(source: &str) -> Result<(), String> {
    ron::from_str::<herald::Herald>(source)
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn example_config_parses() {
    let result = parse(include_str!("../../herald.config.ron"));
    assert!(result.is_ok(), "example config failed to parse: {result:?}");
}

#[test]
fn minimal_config_falls_back_to_defaults() {
    let result = parse("Herald(store: Memory, cache: Memory, bus: Memory)");
    assert!(result.is_ok(), "minimal config failed to parse: {result:?}");
}

#[test]
fn empty_config_is_the_development_default() {
    let result = parse("Herald()");
    assert!(result.is_ok(), "empty config failed to parse: {result:?}");
}

use std::sync::Arc;

use chrono::{Local, TimeZone};
use wisp::config::MemoryProperties;
use wisp::script::{Expander, PropertyAccessor};

fn expander() -> Expander {
    Expander::new(Arc::new(MemoryProperties::new()))
}

fn fixed_now() -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2026, 8, 7, 9, 5, 3).unwrap()
}

#[test]
fn calendar_fields_unpadded() {
    let e = expander();
    let mut rng = rand::thread_rng();
    let out = e.expand("%month/%day %hour:%minute:%second", fixed_now(), &mut rng);
    assert_eq!(out, "8/7 9:5:3");
}

#[test]
fn unknown_key_kept_verbatim() {
    let e = expander();
    let mut rng = rand::thread_rng();
    assert_eq!(
        e.expand("keep %foobar intact", fixed_now(), &mut rng),
        "keep %foobar intact"
    );
    assert_eq!(
        e.expand("also %foo[bar] intact", fixed_now(), &mut rng),
        "also %foo[bar] intact"
    );
}

#[test]
fn unknown_and_known_keys_mix() {
    // Replacement must use original-text indices: the unknown key before a
    // known one must not shift the known key's range.
    let e = expander();
    let mut rng = rand::thread_rng();
    assert_eq!(
        e.expand("%mystery and %month", fixed_now(), &mut rng),
        "%mystery and 8"
    );
}

#[test]
fn names_and_fallbacks() {
    let mut e = expander();
    e.selfname = Some("Wisp".into());
    e.keroname = Some("Mote".into());
    let mut rng = rand::thread_rng();
    assert_eq!(e.expand("%selfname", fixed_now(), &mut rng), "Wisp");
    assert_eq!(e.expand("%keroname", fixed_now(), &mut rng), "Mote");
    // Unset slots expand to empty, they are known keys.
    assert_eq!(e.expand("[%selfname2]", fixed_now(), &mut rng), "[]");
}

#[test]
fn charname_by_scope() {
    let mut e = expander();
    e.selfname = Some("Wisp".into());
    e.keroname = Some("Mote".into());
    let mut rng = rand::thread_rng();
    assert_eq!(e.expand("%charname[0]", fixed_now(), &mut rng), "Wisp");
    assert_eq!(e.expand("%charname[1]", fixed_now(), &mut rng), "Mote");
    assert_eq!(e.expand("%charname[7]", fixed_now(), &mut rng), "");
}

#[test]
fn username_override_wins() {
    let mut e = expander();
    e.username = Some("Ariel".into());
    let mut rng = rand::thread_rng();
    assert_eq!(e.expand("hi %username", fixed_now(), &mut rng), "hi Ariel");
}

#[test]
fn screen_metrics() {
    let mut e = expander();
    e.screen_width = 1920;
    e.screen_height = 1080;
    let mut rng = rand::thread_rng();
    assert_eq!(
        e.expand("%screenwidth x %screenheight", fixed_now(), &mut rng),
        "1920 x 1080"
    );
}

#[test]
fn property_lookup_delegates() {
    let props = Arc::new(MemoryProperties::new());
    props.set("ghost.mood", "sleepy");
    let e = Expander::new(props);
    let mut rng = rand::thread_rng();
    assert_eq!(
        e.expand("Mood %property[ghost.mood]", fixed_now(), &mut rng),
        "Mood sleepy"
    );
    // Missing property expands to empty, not to the raw key.
    assert_eq!(e.expand("%property[nope]", fixed_now(), &mut rng), "");
}

#[test]
fn word_class_picks() {
    let mut e = expander();
    e.lexicon
        .insert("ms".into(), vec!["only-choice".into()]);
    e.lexicon.insert("me".into(), vec![]);
    let mut rng = rand::thread_rng();
    // Single-entry class is deterministic.
    assert_eq!(e.expand("%ms!", fixed_now(), &mut rng), "only-choice!");
    // Empty class expands to empty string.
    assert_eq!(e.expand("a%me!", fixed_now(), &mut rng), "a!");
    // `m?` is a valid class key.
    e.lexicon.insert("m?".into(), vec!["hm".into()]);
    assert_eq!(e.expand("%m?", fixed_now(), &mut rng), "hm");
}

#[test]
fn multiple_picks_in_one_text() {
    let mut e = expander();
    e.lexicon.insert("mh".into(), vec!["x".into()]);
    let mut rng = rand::thread_rng();
    assert_eq!(
        e.expand("%mh %mh %month", fixed_now(), &mut rng),
        "x x 8"
    );
}

#[test]
fn empty_bracket_is_not_an_argument() {
    let e = expander();
    let mut rng = rand::thread_rng();
    // `%property[]` leaves the empty bracket alone: the key matches bare
    // and the `[]` stays in the text.
    assert_eq!(e.expand("%property[]", fixed_now(), &mut rng), "[]");
}

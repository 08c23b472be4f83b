//! Text effects.
//!
//! Pure functions of `(text, context, rng)`. Randomized effects draw only
//! from the generator passed in, so a seeded generator reproduces output
//! exactly.

use rand::{Rng, seq::SliceRandom};

use super::PunishmentKind;
use crate::uid::Uid;

/// Output cap in characters, applied after every effect.
pub const MAX_TEXT_CHARS: usize = 2000;

/// Per-application inputs beyond the text itself.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext {
    /// Sender's UID (copycats pattern)
    pub uid: Uid,
    /// Times this entry has been applied before (torment rotation)
    pub cycle: usize,
}

/// Apply one effect.
pub fn apply_effect<R: Rng + ?Sized>(
    kind: PunishmentKind,
    text: &str,
    ctx: EffectContext,
    rng: &mut R,
) -> String {
    use PunishmentKind as K;

    let out = match kind {
        K::Whisper => text.to_string(),
        K::Backward => text.chars().rev().collect(),
        K::Stutterstep => map_words(text, |w| format!("{w} {w}")),
        K::Elongate => elongate(text),
        K::Uppercase => text.to_uppercase(),
        K::Lowercase => text.to_lowercase(),
        K::Robotic => robotic(text),
        K::Alternating => alternating(text),
        K::Fancy => text.chars().map(fancy_char).collect(),
        K::Uwu => uwu(text, rng),
        K::Pirate => pirate(text, rng),
        K::Shakespearean => shakespearean(text, rng),
        K::Caveman => caveman(text, rng),
        K::Censor => map_words(text, |w| {
            if w.chars().count() > 3 && rng.gen_bool(0.4) { "[CENSORED]".to_string() } else { w.to_string() }
        }),
        K::Confused => confused(text, rng),
        K::Paranoid => format!("{text}{}", pick(rng, &PARANOID)),
        K::Drunk => drunk(text, rng),
        K::Hiccup => map_words(text, |w| {
            if rng.gen_bool(0.4) { format!("{w} *hic*") } else { w.to_string() }
        }),
        K::Whistle => map_words(text, |w| w.chars().map(|_| pick(rng, &WHISTLES)).collect()),
        K::Mumble => map_words(text, mumble_word),
        K::Spaghetti => spaghetti(text, ctx, rng),
        K::Rng => {
            let kind = *pick(rng, &RNG_POOL);
            apply_effect(kind, text, ctx, rng)
        },
        K::Essay => {
            if text.chars().count() < 50 {
                format!("{text} [MESSAGE TOO SHORT - MINIMUM 50 CHARACTERS REQUIRED]")
            } else {
                text.to_string()
            }
        },
        K::Autospell => replace_words(text, &AUTOSPELL),
        K::Torment => {
            let kind = TORMENT_CYCLE[ctx.cycle % TORMENT_CYCLE.len()];
            apply_effect(kind, text, ctx, rng)
        },
        K::Copycats => copycats(text, ctx.uid),
        K::Subtitles => format!("{text}{}", pick(rng, &SUBTITLES)),
        K::Spotlight => format!("📣 EVERYONE LOOK: {text}"),
        K::Emoji => format!("{text} {}", pick(rng, &EMOJI)),
    };

    truncate(out)
}

fn truncate(text: String) -> String {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// Apply `f` to each whitespace-separated word, rejoining with single spaces.
fn map_words(text: &str, f: impl FnMut(&str) -> String) -> String {
    text.split_whitespace().map(f).collect::<Vec<_>>().join(" ")
}

fn replace_words(text: &str, table: &[(&str, &str)]) -> String {
    map_words(text, |w| {
        let lower = w.to_lowercase();
        table
            .iter()
            .find(|(from, _)| *from == lower)
            .map_or_else(|| w.to_string(), |(_, to)| (*to).to_string())
    })
}

const PARANOID: [&str; 5] = [
    " (they're watching)",
    " (don't trust them)",
    " (they know)",
    " (THEY'RE LISTENING)",
    " (it's a conspiracy)",
];

const WHISTLES: [char; 4] = ['♪', '♫', '~', '♬'];

const SUBTITLES: [&str; 5] = [
    " [ominous music playing]",
    " [confusing noises]",
    " [awkward silence]",
    " [dramatic pause]",
    " [indistinct chatter]",
];

const EMOJI: [&str; 10] = ["😀", "😎", "🤡", "👻", "🎃", "🦄", "🐱", "🐶", "🎮", "⭐"];

const AUTOSPELL: [(&str, &str); 9] = [
    ("the", "teh"),
    ("you", "u"),
    ("your", "ur"),
    ("there", "their"),
    ("their", "there"),
    ("to", "too"),
    ("too", "to"),
    ("its", "it's"),
    ("it's", "its"),
];

const RNG_POOL: [PunishmentKind; 7] = [
    PunishmentKind::Backward,
    PunishmentKind::Uppercase,
    PunishmentKind::Lowercase,
    PunishmentKind::Uwu,
    PunishmentKind::Pirate,
    PunishmentKind::Robotic,
    PunishmentKind::Alternating,
];

const SPAGHETTI_POOL: [PunishmentKind; 5] = [
    PunishmentKind::Uppercase,
    PunishmentKind::Backward,
    PunishmentKind::Elongate,
    PunishmentKind::Confused,
    PunishmentKind::Drunk,
];

/// Effects torment rotates through, one per message.
pub const TORMENT_CYCLE: [PunishmentKind; 5] = [
    PunishmentKind::Uppercase,
    PunishmentKind::Backward,
    PunishmentKind::Uwu,
    PunishmentKind::Robotic,
    PunishmentKind::Confused,
];

fn elongate(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        out.push(c);
        if "aeiouAEIOU".contains(c) {
            out.push(c);
            out.push(c);
        }
    }
    out
}

fn robotic(text: &str) -> String {
    const WORDS: [&str; 4] = ["[BEEP]", "[BOOP]", "[WHIRR]", "[BUZZ]"];
    let count = text.split_whitespace().count().max(1);
    (0..count).map(|i| WORDS[i % WORDS.len()]).collect::<Vec<_>>().join(" ")
}

fn alternating(text: &str) -> String {
    let mut upper = true;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphabetic() {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            upper = !upper;
        } else {
            out.push(c);
        }
    }
    out
}

/// Mathematical bold letters (U+1D400 block).
fn fancy_char(c: char) -> char {
    let code = match c {
        'A'..='Z' => 0x1D400 + (c as u32 - 'A' as u32),
        'a'..='z' => 0x1D41A + (c as u32 - 'a' as u32),
        _ => return c,
    };
    char::from_u32(code).unwrap_or(c)
}

fn uwu<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    const FACES: [&str; 4] = [" uwu", " owo", " >w<", " ^w^"];
    let mut out = text
        .replace('r', "w")
        .replace('R', "W")
        .replace('l', "w")
        .replace('L', "W")
        .replace("no", "nyo")
        .replace("No", "Nyo")
        .replace("na", "nya")
        .replace("Na", "Nya");
    if rng.gen_bool(0.3) {
        out.push_str(*pick(rng, &FACES));
    }
    out
}

fn pirate<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    const WORDS: [(&str, &str); 8] = [
        ("hello", "ahoy"),
        ("hi", "ahoy"),
        ("yes", "aye"),
        ("my", "me"),
        ("you", "ye"),
        ("your", "yer"),
        ("are", "be"),
        ("is", "be"),
    ];
    const EXCLAIMS: [&str; 3] = [", arr!", ", matey!", ", ye scurvy dog!"];
    let mut out = replace_words(&text.to_lowercase(), &WORDS);
    if rng.gen_bool(0.3) {
        out.push_str(*pick(rng, &EXCLAIMS));
    }
    out
}

fn shakespearean<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    const WORDS: [(&str, &str); 6] = [
        ("you", "thou"),
        ("your", "thy"),
        ("yours", "thine"),
        ("are", "art"),
        ("yes", "aye"),
        ("no", "nay"),
    ];
    let out = replace_words(text, &WORDS);
    if rng.gen_bool(0.2) { format!("Hark! {out}") } else { out }
}

fn caveman<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    const GRUNTS: [&str; 6] = ["UGH", "GRUNT", "OOG", "RAWR", "HMPH", "GRUG"];
    let words = text.split_whitespace().count();
    if words == 0 {
        return "UGH".to_string();
    }
    (0..words.div_ceil(2)).map(|_| *pick(rng, &GRUNTS)).collect::<Vec<_>>().join(" ")
}

fn confused<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= 1 {
        return text.to_string();
    }
    words.shuffle(rng);
    words.join(" ")
}

fn drunk<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut out = map_words(text, |word| {
        let mut slurred = String::with_capacity(word.len() * 2);
        if rng.gen_bool(0.3) {
            slurred.push_str(word);
            slurred.push(' ');
        }
        for (i, c) in word.chars().enumerate() {
            slurred.push(c);
            if i > 0 && rng.gen_bool(0.2) {
                slurred.push(c);
            }
        }
        slurred
    });
    if rng.gen_bool(0.3) {
        out.push_str(" *hic*");
    }
    out
}

fn mumble_word(word: &str) -> String {
    let last = word.chars().count().saturating_sub(1);
    word.chars()
        .enumerate()
        .map(|(i, c)| if i == 0 || i == last || !c.is_alphabetic() { c } else { '*' })
        .collect()
}

fn spaghetti<R: Rng + ?Sized>(text: &str, ctx: EffectContext, rng: &mut R) -> String {
    let rounds = rng.gen_range(2..=3);
    let mut out = text.to_string();
    for _ in 0..rounds {
        let kind = *pick(rng, &SPAGHETTI_POOL);
        out = apply_effect(kind, &out, ctx, rng);
    }
    out
}

/// Doubles letters at a stride derived from `uid`, so each player gets a
/// stable pattern that differs from their neighbours'.
fn copycats(text: &str, uid: Uid) -> String {
    let stride = (uid % 5 + 2) as usize;
    let offset = uid as usize % stride;
    let mut out = String::with_capacity(text.len() + text.len() / stride + 1);
    for (i, c) in text.chars().enumerate() {
        out.push(c);
        if i > 0 && i % stride == offset && c.is_alphabetic() {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn run(kind: PunishmentKind, text: &str) -> String {
        let mut rng = StdRng::seed_from_u64(7);
        apply_effect(kind, text, EffectContext { uid: 0, cycle: 0 }, &mut rng)
    }

    #[test]
    fn deterministic_effects() {
        assert_eq!(run(PunishmentKind::Backward, "abc def"), "fed cba");
        assert_eq!(run(PunishmentKind::Stutterstep, "hi there"), "hi hi there there");
        assert_eq!(run(PunishmentKind::Elongate, "cat"), "caaat");
        assert_eq!(run(PunishmentKind::Robotic, "a b c d e"), "[BEEP] [BOOP] [WHIRR] [BUZZ] [BEEP]");
        assert_eq!(run(PunishmentKind::Robotic, ""), "[BEEP]");
        assert_eq!(run(PunishmentKind::Alternating, "hello, world"), "HeLlO, wOrLd");
        assert_eq!(run(PunishmentKind::Fancy, "Ab1"), "𝐀𝐛1");
        assert_eq!(run(PunishmentKind::Mumble, "hello a hi"), "h***o a hi");
        assert_eq!(run(PunishmentKind::Autospell, "The cat to YOU"), "teh cat too u");
        assert_eq!(run(PunishmentKind::Spotlight, "hi"), "📣 EVERYONE LOOK: hi");
        assert_eq!(run(PunishmentKind::Whisper, "psst"), "psst");
    }

    #[test]
    fn essay_pads_short_messages() {
        assert!(run(PunishmentKind::Essay, "short").ends_with("MINIMUM 50 CHARACTERS REQUIRED]"));
        let long = "x".repeat(50);
        assert_eq!(run(PunishmentKind::Essay, &long), long);
    }

    #[test]
    fn caveman_grunts_half_the_words() {
        let out = run(PunishmentKind::Caveman, "one two three");
        assert_eq!(out.split(' ').count(), 2);
        assert_eq!(run(PunishmentKind::Caveman, "   "), "UGH");
    }

    #[test]
    fn confused_keeps_the_same_words() {
        let mut out: Vec<String> =
            run(PunishmentKind::Confused, "a b c d e f").split(' ').map(str::to_string).collect();
        out.sort();
        assert_eq!(out, ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(run(PunishmentKind::Confused, "single"), "single");
    }

    #[test]
    fn torment_rotates_by_cycle() {
        let mut rng = StdRng::seed_from_u64(1);
        let upper = apply_effect(PunishmentKind::Torment, "abc", EffectContext { uid: 0, cycle: 0 }, &mut rng);
        let back = apply_effect(PunishmentKind::Torment, "abc", EffectContext { uid: 0, cycle: 1 }, &mut rng);
        let robot = apply_effect(PunishmentKind::Torment, "abc", EffectContext { uid: 0, cycle: 8 }, &mut rng);
        assert_eq!(upper, "ABC");
        assert_eq!(back, "cba");
        assert_eq!(robot, "[BEEP]");
    }

    #[test]
    fn copycats_is_stable_per_uid() {
        // uid 3: stride 5, offset 3
        assert_eq!(copycats("abcdefghij", 3), "abcddefghiij");
        assert_eq!(copycats("abcdefghij", 3), copycats("abcdefghij", 3));
        assert_ne!(copycats("abcdefghij", 3), copycats("abcdefghij", 4));
        assert_eq!(copycats("", 9), "");
    }

    #[test]
    fn uwu_and_pirate_sometimes_add_a_flourish() {
        let mut rng = StdRng::seed_from_u64(3);
        let uwu: Vec<String> = (0..50).map(|_| uwu("roll", &mut rng)).collect();
        assert!(uwu.iter().all(|s| s.starts_with("woww")));
        assert!(uwu.iter().any(|s| s == "woww"));
        assert!(uwu.iter().any(|s| s.len() > "woww".len()));

        let pirate: Vec<String> = (0..50).map(|_| pirate("Hello you", &mut rng)).collect();
        assert!(pirate.iter().all(|s| s.starts_with("ahoy ye")));
        assert!(pirate.iter().any(|s| s.ends_with('!')));
    }

    #[test]
    fn output_is_capped() {
        let long = "a".repeat(MAX_TEXT_CHARS + 10);
        assert_eq!(run(PunishmentKind::Stutterstep, &long).chars().count(), MAX_TEXT_CHARS);
    }
}

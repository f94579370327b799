use super::*;

fn resolver() -> IntentResolver {
    let mut variants = HashMap::new();
    variants.insert("lisa".to_string(), "Lissa".to_string());
    variants.insert("lissa".to_string(), "Lissa".to_string());
    variants.insert("genesis".to_string(), "Genesis".to_string());
    variants.insert("alloy".to_string(), "Aloy".to_string());
    let filler_words = vec!["hey", "hi", "hello", "please", "ok", "okay", "so", "um"]
        .into_iter()
        .map(str::to_string)
        .collect();
    IntentResolver::new(variants, filler_words, "Genesis".to_string())
}

#[tokio::test]
async fn colon_separator_resolves_and_strips_prefix() {
    let r = resolver();
    let (name, cleaned) = r.resolve("Genesis: what's the weather?").await;
    assert_eq!(name, "Genesis");
    assert_eq!(cleaned, "what's the weather?");
}

#[tokio::test]
async fn fuzzy_name_resolves_to_canonical() {
    let r = resolver();
    let (name, cleaned) = r.resolve("Lisa, tell me a joke").await;
    assert_eq!(name, "Lissa");
    assert_eq!(cleaned, "tell me a joke");
}

#[tokio::test]
async fn at_prefix_resolves() {
    let r = resolver();
    let (name, cleaned) = r.resolve("@alloy what's up").await;
    assert_eq!(name, "Aloy");
    assert_eq!(cleaned, "what's up");
}

#[tokio::test]
async fn filler_words_are_skipped_before_name() {
    let r = resolver();
    let (name, cleaned) = r.resolve("hey genesis can you help").await;
    assert_eq!(name, "Genesis");
    assert_eq!(cleaned, "can you help");
}

#[tokio::test]
async fn sticky_active_companion_persists_with_no_address() {
    let r = resolver();
    let (first, _) = r.resolve("Genesis: what's the weather?").await;
    assert_eq!(first, "Genesis");
    let (second, cleaned) = r.resolve("and tomorrow?").await;
    assert_eq!(second, "Genesis");
    assert_eq!(cleaned, "and tomorrow?");
}

#[tokio::test]
async fn explicit_address_updates_sticky_value() {
    let r = resolver();
    r.resolve("Genesis: hi").await;
    let (name, _) = r.resolve("Lisa: tell me a joke").await;
    assert_eq!(name, "Lissa");
    let (next, _) = r.resolve("another one").await;
    assert_eq!(next, "Lissa");
}

#[tokio::test]
async fn no_addressing_falls_back_to_default() {
    let r = resolver();
    let (name, cleaned) = r.resolve("what time is it").await;
    assert_eq!(name, "Genesis");
    assert_eq!(cleaned, "what time is it");
}

#[tokio::test]
async fn idempotent_on_cleaned_tail() {
    let r = resolver();
    let (_, cleaned) = r.resolve("Genesis: what's the weather?").await;
    let (name2, cleaned2) = r.resolve(&cleaned).await;
    assert_eq!(name2, "Genesis");
    assert_eq!(cleaned2, cleaned);
}

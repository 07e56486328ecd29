use crate::domain::pitch::Pitch;
use crate::domain::slot::Slot;

pub const DEFAULT_SITE_URL: &str = "https://www.mylocalpitch.com";

/// Public venue page, e.g. `https://www.mylocalpitch.com/london/venue/<path>`.
pub fn venue_url(site_url: &str, pitch: &Pitch) -> String {
    format!("{}/{}/venue/{}", site_url.trim_end_matches('/'), pitch.city, pitch.path)
}

/// Link that opens the provider's checkout page for `slot`. Booking itself
/// happens on the provider's site.
pub fn checkout_url(site_url: &str, pitch: &Pitch, slot: &Slot) -> String {
    format!("{}/checkout/{}", venue_url(site_url, pitch), slot.id)
}

#[cfg(test)]
mod tests {
    use super::{checkout_url, venue_url, DEFAULT_SITE_URL};
    use crate::domain::pitch::Pitch;
    use crate::fixtures::slot_at;

    #[test]
    fn checkout_url_combines_city_path_and_slot_id() {
        let pitch = Pitch::new(
            "32208",
            "Finsbury Leisure Centre",
            "finsbury-leisure-centre/football-5-a-side-32208",
            "london",
        );
        let slot = slot_at("987654", "2026-10-20T17:00:00+01:00", 1);

        assert_eq!(
            checkout_url(DEFAULT_SITE_URL, &pitch, &slot),
            "https://www.mylocalpitch.com/london/venue/finsbury-leisure-centre/football-5-a-side-32208/checkout/987654"
        );
        assert_eq!(
            checkout_url("https://example.test/", &pitch, &slot),
            checkout_url("https://example.test", &pitch, &slot)
        );
    }

    #[test]
    fn venue_url_is_the_checkout_prefix() {
        let pitch = Pitch::new("1", "One", "one/football", "leeds");
        assert_eq!(venue_url("https://example.test", &pitch), "https://example.test/leeds/venue/one/football");
    }
}

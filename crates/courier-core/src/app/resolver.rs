//! RecipientResolver - 自由形式の宛先を正規の NetworkAddress に解決する
//!
//! # アルゴリズム
//! 1. trim して空なら `AddressError::Empty`
//! 2. group / broadcast の宛先はそのまま parse して返す（正規化も probe もしない）
//! 3. `@` が無ければ数字以外を除去、既存の user server サフィックスも除去
//! 4. 既定の国番号で始まらなければそのまま返す（国際番号には 9 桁問題が無い）
//! 5. 始まる場合は 12 桁 / 13 桁の候補を作り、existence probe で登録済みのものを選ぶ
//! 6. probe の失敗・不一致では正規化済みの数字にフォールバック
//!
//! 構造的に不正な入力以外で失敗することはありません。

use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::domain::address::denotes_group_or_broadcast;
use crate::domain::{AddressError, NetworkAddress};
use crate::ports::TransportSession;

/// Position of the mobile digit: after the 2-digit country code and the
/// 2-digit area code.
pub const MOBILE_DIGIT_POSITION: usize = 4;
const LONG_FORM_LEN: usize = 13;
const SHORT_FORM_LEN: usize = 12;

/// Outcome of the local normalization step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Final address, no probe needed.
    Direct(NetworkAddress),
    /// Domestic number whose mobile-digit form must be probed.
    Domestic(String),
}

#[derive(Debug, Clone)]
pub struct RecipientResolver {
    config: ResolverConfig,
}

impl RecipientResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `raw` to a canonical address, probing the network for the
    /// registered mobile-digit variant of domestic numbers.
    pub async fn resolve(
        &self,
        session: &dyn TransportSession,
        raw: &str,
    ) -> Result<NetworkAddress, AddressError> {
        let digits = match self.normalize(raw)? {
            Normalized::Direct(addr) => return Ok(addr),
            Normalized::Domestic(digits) => digits,
        };

        let candidates = self.candidates(&digits);
        match session.probe_existence(&candidates).await {
            Ok(results) => {
                if let Some(hit) = results
                    .into_iter()
                    .find(|r| r.exists && !r.address.user().is_empty())
                {
                    debug!(query = %hit.query, address = %hit.address, "recipient resolved by probe");
                    return Ok(hit.address);
                }
                debug!(%digits, "no registered candidate, using normalized number");
            }
            Err(e) => {
                warn!(%digits, error = %e, "existence probe failed, using normalized number");
            }
        }
        Ok(self.user_address(digits))
    }

    /// Local part of resolution; never touches the network.
    pub fn normalize(&self, raw: &str) -> Result<Normalized, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if denotes_group_or_broadcast(trimmed) {
            return NetworkAddress::parse(trimmed).map(Normalized::Direct);
        }

        let suffix = format!("@{}", self.config.user_server);
        let user = if trimmed.contains('@') {
            trimmed.strip_suffix(suffix.as_str()).unwrap_or(trimmed)
        } else {
            trimmed
        };

        // 別サーバーの宛先（例: 123@lid）は触らない
        if user.contains('@') {
            return NetworkAddress::parse(user).map(Normalized::Direct);
        }

        let digits: String = user.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(AddressError::Malformed(trimmed.to_string()));
        }

        if digits.starts_with(self.config.default_country_prefix.as_str()) {
            Ok(Normalized::Domestic(digits))
        } else {
            Ok(Normalized::Direct(self.user_address(digits)))
        }
    }

    /// The number itself, followed by its mobile-digit variant when its length
    /// is ambiguous.
    pub fn candidates(&self, digits: &str) -> Vec<String> {
        let mut out = vec![digits.to_string()];
        let variant = match digits.len() {
            LONG_FORM_LEN => without_mobile_digit(digits),
            SHORT_FORM_LEN => with_mobile_digit(digits, self.config.mobile_digit),
            _ => None,
        };
        out.extend(variant);
        out
    }

    fn user_address(&self, digits: String) -> NetworkAddress {
        NetworkAddress::new(digits, self.config.user_server.as_str())
    }
}

/// Drop the character at the mobile-digit position of a 13-digit number.
pub fn without_mobile_digit(digits: &str) -> Option<String> {
    if digits.len() != LONG_FORM_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (head, tail) = digits.split_at(MOBILE_DIGIT_POSITION);
    Some(format!("{head}{}", &tail[1..]))
}

/// Insert `digit` at the mobile-digit position of a 12-digit number.
pub fn with_mobile_digit(digits: &str, digit: char) -> Option<String> {
    if digits.len() != SHORT_FORM_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (head, tail) = digits.split_at(MOBILE_DIGIT_POSITION);
    Some(format!("{head}{digit}{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeSession, USER_SERVER};
    use rstest::rstest;
    use std::sync::atomic::Ordering;

    fn resolver() -> RecipientResolver {
        RecipientResolver::new(ResolverConfig::default())
    }

    #[rstest]
    #[case("120363025246125486@g.us")]
    #[case("status@broadcast")]
    #[case("  1203-63@g.us ")]
    #[tokio::test]
    async fn group_and_broadcast_pass_through_unprobed(#[case] raw: &str) {
        let session = FakeSession::new();
        let addr = resolver().resolve(session.as_ref(), raw).await.unwrap();

        assert_eq!(addr.to_string(), raw.trim());
        assert!(session.probe_calls().is_empty());
    }

    #[rstest]
    #[case("+1 (415) 555-0100", "14155550100")]
    #[case("447700900123", "447700900123")]
    #[case("14155550100@s.whatsapp.net", "14155550100")]
    #[tokio::test]
    async fn international_numbers_skip_probe(#[case] raw: &str, #[case] user: &str) {
        let session = FakeSession::new();
        let addr = resolver().resolve(session.as_ref(), raw).await.unwrap();

        assert_eq!(addr.user(), user);
        assert_eq!(addr.server(), USER_SERVER);
        assert!(session.probe_calls().is_empty());
    }

    #[tokio::test]
    async fn twelve_digits_resolve_to_registered_long_form() {
        let session = FakeSession::new();
        session.register("5511999998888");

        let addr = resolver()
            .resolve(session.as_ref(), "551199998888")
            .await
            .unwrap();

        assert_eq!(addr.to_string(), "5511999998888@s.whatsapp.net");
        assert_eq!(
            session.probe_calls(),
            vec![vec!["551199998888".to_string(), "5511999998888".to_string()]]
        );
    }

    #[tokio::test]
    async fn thirteen_digits_resolve_to_registered_short_form() {
        let session = FakeSession::new();
        session.register("551188887777");

        let addr = resolver()
            .resolve(session.as_ref(), "55 11 98888-7777")
            .await
            .unwrap();

        assert_eq!(addr.user(), "551188887777");
    }

    #[tokio::test]
    async fn probe_failure_falls_back_to_normalized_digits() {
        let session = FakeSession::new();
        session.fail_probe.store(true, Ordering::SeqCst);

        let addr = resolver()
            .resolve(session.as_ref(), "5511988887777")
            .await
            .unwrap();

        assert_eq!(addr.to_string(), "5511988887777@s.whatsapp.net");
        assert_eq!(session.probe_calls().len(), 1);
    }

    #[tokio::test]
    async fn no_registered_candidate_falls_back() {
        let session = FakeSession::new();
        let addr = resolver()
            .resolve(session.as_ref(), "551199998888")
            .await
            .unwrap();
        assert_eq!(addr.user(), "551199998888");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_input_is_empty(#[case] raw: &str) {
        assert_eq!(resolver().normalize(raw), Err(AddressError::Empty));
    }

    #[rstest]
    #[case("not-a-number")]
    #[case("@s.whatsapp.net")]
    #[case("@g.us")]
    fn structurally_invalid_input_is_malformed(#[case] raw: &str) {
        assert!(matches!(
            resolver().normalize(raw),
            Err(AddressError::Malformed(_))
        ));
    }

    #[test]
    fn other_servers_are_left_alone() {
        assert_eq!(
            resolver().normalize("99887766@lid"),
            Ok(Normalized::Direct(NetworkAddress::new("99887766", "lid")))
        );
    }

    #[rstest]
    #[case("5511988887777", Some("551188887777"))]
    #[case("551188887777", None)]
    #[case("55119888877a7", None)]
    fn long_form_drops_position_four(#[case] digits: &str, #[case] expected: Option<&str>) {
        assert_eq!(without_mobile_digit(digits).as_deref(), expected);
    }

    #[rstest]
    #[case("551188887777", Some("5511988887777"))]
    #[case("5511988887777", None)]
    fn short_form_gains_mobile_digit(#[case] digits: &str, #[case] expected: Option<&str>) {
        assert_eq!(with_mobile_digit(digits, '9').as_deref(), expected);
    }

    #[rstest]
    #[case("5511988887777")]
    #[case("5521912345678")]
    fn removing_then_inserting_round_trips(#[case] long: &str) {
        let short = without_mobile_digit(long).unwrap();
        assert_eq!(with_mobile_digit(&short, '9').as_deref(), Some(long));
    }

    #[rstest]
    #[case("551188887777")]
    #[case("552112345678")]
    fn inserting_then_removing_round_trips(#[case] short: &str) {
        let long = with_mobile_digit(short, '9').unwrap();
        assert_eq!(without_mobile_digit(&long).as_deref(), Some(short));
    }

    #[test]
    fn candidates_list_original_first() {
        let r = resolver();
        assert_eq!(
            r.candidates("5511988887777"),
            vec!["5511988887777".to_string(), "551188887777".to_string()]
        );
        assert_eq!(r.candidates("55119888"), vec!["55119888".to_string()]);
    }
}

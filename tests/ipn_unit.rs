use token_portal::api::webhooks_nowpayments::{extract_order_user, sign_ipn_sha512_hex};

#[test]
fn signature_matches_known_vector() {
    let body = br#"{"payment_status":"finished","order_id":"7_1700000000_Ab3dE9","price_amount":50,"price_currency":"USD"}"#;
    let sig = sign_ipn_sha512_hex("test-ipn-secret", body);
    assert_eq!(
        sig,
        "434dc49019c91d37690f8308a90caf8f6b38cbd87a67f641bc846b13a149bcb2ff7a7543eabf40fb9dd7385c0c136b742f041787d294a21a4adea3ff4f289c1f"
    );
}

#[test]
fn signature_depends_on_body() {
    let sig = sign_ipn_sha512_hex("test-ipn-secret", b"{}");
    assert_eq!(
        sig,
        "8969252982ee2d8a2ec41aea17ef5eed4942765b9ad4b3ed68b18459ffce349ad3716ebabfb25dcb10e3ec2616c2f73d1340e0db4cb11c02b118058c8b021d66"
    );
    assert_ne!(sig, sign_ipn_sha512_hex("other-secret", b"{}"));
}

#[test]
fn order_id_user_extraction() {
    assert_eq!(extract_order_user("7_1700000000_Ab3dE9"), Some(7));
    assert_eq!(extract_order_user("42_x"), Some(42));
    assert_eq!(extract_order_user("not-an-order"), None);
    assert_eq!(extract_order_user(""), None);
}

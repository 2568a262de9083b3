use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use svc_claims::{JwtValidationConfig, JwtVerifier, StaticJwkSource};
use svc_grpc::authenticate;
use tonic::metadata::MetadataMap;

#[derive(Serialize)]
struct Claims {
    sub: String,
    tenant_id: String,
    partition_id: String,
    roles: Vec<String>,
    exp: usize,
}

fn make_verifier() -> (JwtVerifier<StaticJwkSource>, EncodingKey) {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let public_key = RsaPublicKey::from(&private_key);

    let pem = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();

    let n = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, public_key.n().to_bytes_be());
    let e = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, public_key.e().to_bytes_be());
    let decoding_key = DecodingKey::from_rsa_components(&n, &e).unwrap();

    let jwks = StaticJwkSource::new("kid-1", decoding_key);
    let verifier = JwtVerifier::new(jwks, JwtValidationConfig::default());
    (verifier, encoding_key)
}

fn token(encoding_key: &EncodingKey) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("kid-1".to_string());
    let claims = Claims {
        sub: "svc-caller".to_string(),
        tenant_id: "acme".to_string(),
        partition_id: "eu".to_string(),
        roles: vec!["member".to_string()],
        exp: (chrono_now() + 3600) as usize,
    };
    encode(&header, &claims, encoding_key).unwrap()
}

fn chrono_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[test]
fn a_valid_bearer_token_authenticates_successfully() {
    let (verifier, encoding_key) = make_verifier();
    let jwt = token(&encoding_key);

    let mut metadata = MetadataMap::new();
    metadata.insert("authorization", format!("Bearer {jwt}").parse().unwrap());

    let claims = authenticate(&metadata, &verifier).unwrap();
    assert_eq!(claims.subject(), "svc-caller");
    assert_eq!(claims.tenant_id(), "acme");
}

#[test]
fn a_missing_bearer_token_is_rejected_as_unauthenticated() {
    let (verifier, _encoding_key) = make_verifier();
    let metadata = MetadataMap::new();

    let err = authenticate(&metadata, &verifier).unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}

#[test]
fn a_malformed_token_is_rejected_as_unauthenticated() {
    let (verifier, _encoding_key) = make_verifier();
    let mut metadata = MetadataMap::new();
    metadata.insert("authorization", "Bearer not-a-jwt".parse().unwrap());

    let err = authenticate(&metadata, &verifier).unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}

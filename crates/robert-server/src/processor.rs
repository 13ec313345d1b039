//! Request processing: registration and authenticated-request validation.
//!
//! Every authenticated flow runs the same pipeline, cheapest check first:
//!
//! 1. field sizes
//! 2. EBID decryption with the claimed epoch's date key, epoch cross-check
//! 3. identity lookup by the decrypted idA
//! 4. MAC verification with the identity's K_A
//!
//! Nothing here compares `epochId` or `time` with the server clock. The
//! processor decides whether a request is authentic, never whether it is
//! timely.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use robert_crypto::{
    EcdhKeyPair, FederationCipher, IdA, KeyEncryptionKey, RequestType, ID_A_LENGTH,
    IDENTITY_KEY_LENGTH,
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::auth::{
    check_hello_mac_size, check_hello_time_size, check_mac_size, check_time_size, verify_hello,
    verify_request_mac,
};
use crate::clock::Clock;
use crate::codec::EbidCodec;
use crate::config::{ServerConfig, ServerSecrets};
use crate::error::{ConfigError, Result, ServerError, StoreError};
use crate::identity::{IdentityRecord, IdentityStore};
use crate::keystore::KeyStore;
use crate::tuples::{build_tuples, seal_tuples};
use crate::types::{
    AuthRequest, AuthResponse, HelloOutcome, HelloRequest, RegistrationRequest,
    RegistrationResponse, StatusRequest, StatusResponse,
};

/// Stateless per call; share it behind an `Arc`.
pub struct RequestProcessor {
    config: ServerConfig,
    codec: EbidCodec,
    identities: Arc<dyn IdentityStore>,
    ecdh: EcdhKeyPair,
    federation: FederationCipher,
    kek: KeyEncryptionKey,
}

impl RequestProcessor {
    pub fn new(
        config: ServerConfig,
        secrets: &ServerSecrets,
        clock: Arc<dyn Clock>,
        keys: Arc<dyn KeyStore>,
        identities: Arc<dyn IdentityStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let loaded = secrets.load()?;
        Ok(Self {
            config,
            codec: EbidCodec::new(clock, keys),
            identities,
            ecdh: loaded.ecdh,
            federation: loaded.federation,
            kek: loaded.kek,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Uncompressed SEC1 encoding of the long-term registration key.
    pub fn server_public_key(&self) -> Vec<u8> {
        self.ecdh.public_key_sec1()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a new identity and return its first tuple bundle.
    ///
    /// Nothing is written until the bundle has been built, so a failure at
    /// any step leaves the store untouched.
    pub async fn create_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse> {
        let result = self.register(request).await;
        let from_epoch_id = request.from_epoch_id;
        match &result {
            Ok(_) => debug!(operation = "create_registration", from_epoch_id, "request accepted"),
            Err(e @ ServerError::Internal(_)) => warn!(
                operation = "create_registration",
                from_epoch_id,
                error_kind = e.kind(),
                error = %e,
                "request failed"
            ),
            Err(e) => debug!(
                operation = "create_registration",
                from_epoch_id,
                error_kind = e.kind(),
                error = %e,
                "request rejected"
            ),
        }
        result
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationResponse> {
        let keys = self
            .ecdh
            .derive_identity_keys(&request.client_public_key)
            .map_err(|e| ServerError::internal(format!("key agreement failed: {e}")))?;
        let wrapped_key_for_mac = self
            .kek
            .wrap(&keys.key_for_mac)
            .map_err(|e| ServerError::internal(e.to_string()))?;
        let wrapped_key_for_tuples = self
            .kek
            .wrap(&keys.key_for_tuples)
            .map_err(|e| ServerError::internal(e.to_string()))?;

        for attempt in 1..=self.config.max_id_allocation_attempts {
            let id_a = random_id_a()?;
            if self.store_call("exists", self.identities.exists(&id_a)).await? {
                debug!(attempt, "idA collision, drawing again");
                continue;
            }

            let tuples = build_tuples(
                &self.codec,
                &self.federation,
                &id_a,
                request.country_code,
                request.from_epoch_id,
                self.config.registration_bundle_days,
            )?;
            let sealed = seal_tuples(&keys.key_for_tuples, &tuples)?;

            let record = IdentityRecord {
                id_a,
                wrapped_key_for_mac,
                wrapped_key_for_tuples,
                country_code: request.country_code,
                created_at: Utc::now(),
            };
            match self.timed("insert", self.identities.insert(record)).await? {
                Ok(()) => {
                    info!(attempt, tuples = tuples.len(), "identity registered");
                    debug!(id_a = %hex::encode(id_a), "registered idA");
                    return Ok(RegistrationResponse {
                        id_a,
                        tuples: sealed,
                    });
                }
                Err(StoreError::AlreadyExists) => {
                    debug!(attempt, "idA taken between check and insert, drawing again");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServerError::internal(format!(
            "no fresh idA after {} attempts",
            self.config.max_id_allocation_attempts
        )))
    }

    // ========================================================================
    // Authenticated requests
    // ========================================================================

    /// Authenticate a request for `request_type` (STATUS, UNREGISTER or
    /// DELETE_HISTORY).
    pub async fn get_id_from_auth(
        &self,
        request: &AuthRequest,
        request_type: u8,
    ) -> Result<AuthResponse> {
        let result = async {
            let request_type = match RequestType::try_from(request_type) {
                Ok(RequestType::Exchange) | Err(_) => {
                    return Err(ServerError::bad_request("invalid request type"))
                }
                Ok(request_type) => request_type,
            };
            self.authenticate(request, request_type).await
        }
        .await;
        observe("get_id_from_auth", request.epoch_id, result)
    }

    /// Authenticate an UNREGISTER request. The caller deletes the returned
    /// identity.
    pub async fn delete_id(&self, request: &AuthRequest) -> Result<IdA> {
        let result = self
            .authenticate(request, RequestType::Unregister)
            .await
            .map(|auth| auth.id_a);
        observe("delete_id", request.epoch_id, result)
    }

    /// Authenticate a STATUS request and build a fresh tuple bundle.
    pub async fn get_id_from_status(&self, request: &StatusRequest) -> Result<StatusResponse> {
        let result = self.status(request).await;
        observe("get_id_from_status", request.auth.epoch_id, result)
    }

    async fn status(&self, request: &StatusRequest) -> Result<StatusResponse> {
        let days = request.number_of_days_for_epoch_bundles;
        if days == 0 || days > self.config.max_bundle_days {
            return Err(ServerError::bad_request(format!(
                "numberOfDaysForEpochBundles must be between 1 and {}",
                self.config.max_bundle_days
            )));
        }

        let (auth, record) = self.authenticate_record(&request.auth, RequestType::Status).await?;
        let key_for_tuples = self.unwrap_key(&record.wrapped_key_for_tuples)?;
        let tuples = build_tuples(
            &self.codec,
            &self.federation,
            &auth.id_a,
            record.country_code,
            request.from_epoch_id,
            days,
        )?;
        let sealed = seal_tuples(key_for_tuples.as_slice(), &tuples)?;
        Ok(StatusResponse {
            id_a: auth.id_a,
            epoch_id: auth.epoch_id,
            tuples: sealed,
        })
    }

    /// Shared pipeline of all MAC-authenticated requests.
    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        request_type: RequestType,
    ) -> Result<AuthResponse> {
        self.authenticate_record(request, request_type)
            .await
            .map(|(auth, _)| auth)
    }

    async fn authenticate_record(
        &self,
        request: &AuthRequest,
        request_type: RequestType,
    ) -> Result<(AuthResponse, IdentityRecord)> {
        let ebid = EbidCodec::check_ebid_size(&request.ebid)?;
        let time = check_time_size(&request.time)?;
        check_mac_size(&request.mac)?;

        let id_a = self.codec.decode_for_claimed_epoch(&ebid, request.epoch_id)?;
        let record = self.find_identity(&id_a).await?;

        let key_for_mac = self.unwrap_key(&record.wrapped_key_for_mac)?;
        verify_request_mac(
            key_for_mac.as_slice(),
            request_type,
            &ebid,
            request.epoch_id,
            &time,
            &request.mac,
        )?;

        let auth = AuthResponse {
            id_a,
            epoch_id: request.epoch_id,
            country_code: record.country_code,
        };
        Ok((auth, record))
    }

    // ========================================================================
    // HELLO messages
    // ========================================================================

    /// Validate a HELLO message. HELLOs emitted under another country code
    /// are reported as foreign without touching the key or identity stores.
    pub async fn validate_hello(&self, request: &HelloRequest) -> Result<HelloOutcome> {
        let result = self.hello(request).await;
        observe("validate_hello", request.epoch_id, result)
    }

    async fn hello(&self, request: &HelloRequest) -> Result<HelloOutcome> {
        let ecc = match request.ecc.as_slice() {
            [ecc] => *ecc,
            _ => return Err(ServerError::bad_request("invalid ECC field size")),
        };
        let ebid = EbidCodec::check_ebid_size(&request.ebid)?;
        let time = check_hello_time_size(&request.time)?;
        check_hello_mac_size(&request.mac)?;

        let country_code = self.federation.decrypt_country_code(ecc, &ebid);
        if country_code != self.config.country_code {
            debug!(country_code, epoch_id = request.epoch_id, "foreign HELLO");
            return Ok(HelloOutcome::Foreign { country_code });
        }

        let id_a = self.codec.decode_for_claimed_epoch(&ebid, request.epoch_id)?;
        let record = self.find_identity(&id_a).await?;
        let key_for_mac = self.unwrap_key(&record.wrapped_key_for_mac)?;
        verify_hello(key_for_mac.as_slice(), ecc, &ebid, &time, &request.mac)?;

        Ok(HelloOutcome::Local(AuthResponse {
            id_a,
            epoch_id: request.epoch_id,
            country_code,
        }))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn find_identity(&self, id_a: &IdA) -> Result<IdentityRecord> {
        self.store_call("find", self.identities.find(id_a))
            .await?
            .ok_or(ServerError::NotFound)
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Zeroizing<[u8; IDENTITY_KEY_LENGTH]>> {
        self.kek
            .unwrap(wrapped)
            .map(Zeroizing::new)
            .map_err(|e| ServerError::internal(format!("stored key material unusable: {e}")))
    }

    /// Bound a store call by the configured timeout. Only the timeout itself
    /// is turned into an error here.
    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<std::result::Result<T, StoreError>> {
        let timeout = self.config.store_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(outcome) => {
                if let Err(e) = &outcome {
                    warn!(operation, error = %e, "identity store call failed");
                }
                Ok(outcome)
            }
            Err(_) => {
                warn!(operation, timeout_ms = timeout.as_millis() as u64, "identity store call timed out");
                Err(ServerError::internal(format!("identity store {operation} timed out")))
            }
        }
    }

    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        Ok(self.timed(operation, call).await??)
    }
}

fn random_id_a() -> Result<IdA> {
    let mut id_a = [0u8; ID_A_LENGTH];
    getrandom::getrandom(&mut id_a)
        .map_err(|e| ServerError::internal(format!("RNG failure: {e}")))?;
    Ok(id_a)
}

/// Log the outcome of an operation. Client errors at debug, internal ones at
/// warn. Never logs key material.
fn observe<T>(operation: &'static str, epoch_id: u32, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => debug!(operation, epoch_id, "request accepted"),
        Err(e @ ServerError::Internal(_)) => {
            warn!(operation, epoch_id, error_kind = e.kind(), error = %e, "request failed")
        }
        Err(e) => debug!(operation, epoch_id, error_kind = e.kind(), error = %e, "request rejected"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::identity::MemoryIdentityStore;
    use crate::keystore::{DateKey, KeySnapshot, SnapshotKeyStore};
    use crate::tuples::open_tuples;
    use robert_crypto::compute_mac;

    fn secrets() -> ServerSecrets {
        ServerSecrets {
            ecdh_private_key: [0x31u8; 32],
            federation_key: [0x47u8; 32],
            key_encryption_master: vec![0x5cu8; 32],
        }
    }

    fn processor() -> (RequestProcessor, Arc<MemoryIdentityStore>) {
        let config = ServerConfig::default();
        let clock = Arc::new(FixedClock::from_config(&config, config.service_start()));
        let keys: Vec<DateKey> = (0..4u32)
            .map(|day| DateKey::new(clock.date_of(day * 96), [day as u8 + 0x10; 24]))
            .collect();
        let store = Arc::new(SnapshotKeyStore::with_snapshot(
            KeySnapshot::from_keys(&keys).unwrap(),
        ));
        let identities = Arc::new(MemoryIdentityStore::new());
        let processor =
            RequestProcessor::new(config, &secrets(), clock, store, identities.clone()).unwrap();
        (processor, identities)
    }

    #[tokio::test]
    async fn registration_then_status() {
        let (processor, identities) = processor();
        let client = EcdhKeyPair::generate().unwrap();
        let registration = processor
            .create_registration(&RegistrationRequest {
                client_public_key: client.public_key_sec1(),
                country_code: 0x21,
                from_epoch_id: 0,
            })
            .await
            .unwrap();
        assert_eq!(identities.len(), 1);

        let keys = client
            .derive_identity_keys(&processor.server_public_key())
            .unwrap();
        let tuples = open_tuples(&keys.key_for_tuples, &registration.tuples).unwrap();
        assert_eq!(tuples.len(), 4 * 96);

        let tuple = &tuples[10];
        let time = [0xe4, 0, 0, 1];
        let mac = compute_mac(
            &keys.key_for_mac,
            RequestType::Status,
            &tuple.key.ebid,
            tuple.epoch_id,
            &time,
        )
        .unwrap();
        let status = processor
            .get_id_from_status(&StatusRequest {
                auth: AuthRequest {
                    ebid: tuple.key.ebid.to_vec(),
                    epoch_id: tuple.epoch_id,
                    time: time.to_vec(),
                    mac: mac.to_vec(),
                },
                from_epoch_id: 96,
                number_of_days_for_epoch_bundles: 1,
            })
            .await
            .unwrap();
        assert_eq!(status.id_a, registration.id_a);
        let fresh = open_tuples(&keys.key_for_tuples, &status.tuples).unwrap();
        assert_eq!(fresh.first().unwrap().epoch_id, 96);
    }

    /// Collects the field names of every event emitted on this thread.
    #[derive(Clone, Default)]
    struct FieldRecorder {
        events: Arc<parking_lot::Mutex<Vec<Vec<(String, String)>>>>,
    }

    struct FieldVisitor<'a>(&'a mut Vec<(String, String)>);

    impl tracing::field::Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    impl tracing::Subscriber for FieldRecorder {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            let mut fields = Vec::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.events.lock().push(fields);
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[tokio::test]
    async fn registration_logs_bundle_start_as_from_epoch_id() {
        let recorder = FieldRecorder::default();
        let _guard = tracing::subscriber::set_default(recorder.clone());

        let (processor, _) = processor();
        let client = EcdhKeyPair::generate().unwrap();
        processor
            .create_registration(&RegistrationRequest {
                client_public_key: client.public_key_sec1(),
                country_code: 0x21,
                from_epoch_id: 96,
            })
            .await
            .unwrap();

        let events = recorder.events.lock();
        let outcome = events
            .iter()
            .find(|fields| {
                fields
                    .iter()
                    .any(|(name, value)| name == "operation" && value.contains("create_registration"))
            })
            .expect("registration outcome event");
        assert!(outcome.iter().any(|(name, value)| name == "from_epoch_id" && value == "96"));
        assert!(outcome.iter().all(|(name, _)| name != "epoch_id"));
    }

    #[tokio::test]
    async fn invalid_client_key_is_internal_and_writes_nothing() {
        let (processor, identities) = processor();
        let err = processor
            .create_registration(&RegistrationRequest {
                client_public_key: vec![0x04, 0xde, 0xad],
                country_code: 0x21,
                from_epoch_id: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(identities.is_empty());
    }

    #[tokio::test]
    async fn registration_without_any_key_writes_nothing() {
        let (processor, identities) = processor();
        let client = EcdhKeyPair::generate().unwrap();
        let err = processor
            .create_registration(&RegistrationRequest {
                client_public_key: client.public_key_sec1(),
                country_code: 0x21,
                from_epoch_id: 96 * 30,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(identities.is_empty());
    }

    #[tokio::test]
    async fn exchange_and_unknown_types_are_rejected() {
        let (processor, _) = processor();
        let request = AuthRequest {
            ebid: vec![0u8; 8],
            epoch_id: 1,
            time: vec![0u8; 4],
            mac: vec![0u8; 32],
        };
        for request_type in [0x01u8, 0x00, 0x09] {
            assert_eq!(
                processor.get_id_from_auth(&request, request_type).await,
                Err(ServerError::bad_request("invalid request type"))
            );
        }
    }

    #[tokio::test]
    async fn status_day_count_is_bounded() {
        let (processor, _) = processor();
        let auth = AuthRequest {
            ebid: vec![0u8; 8],
            epoch_id: 1,
            time: vec![0u8; 4],
            mac: vec![0u8; 32],
        };
        for days in [0, processor.config().max_bundle_days + 1] {
            let err = processor
                .get_id_from_status(&StatusRequest {
                    auth: auth.clone(),
                    from_epoch_id: 0,
                    number_of_days_for_epoch_bundles: days,
                })
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn processor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RequestProcessor>();
    }
}

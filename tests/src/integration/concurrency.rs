//! # Concurrency Flows
//!
//! Races operators against each other over the file-backed store, where
//! every committed batch is also a disk write.
//!
//! ## Properties Checked
//!
//! - A token redeemed from many threads at once commits exactly once
//! - Total and per-user limits hold when every contender sees headroom

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use redemption_engine::adapters::{
        FileBackedKVStore, FileBlobStore, OsEntropySource, SystemTimeSource,
    };
    use redemption_engine::test_utils::{admin, operator_with_id, TINY_PNG_DATA_URL};
    use redemption_engine::{
        AdministrationApi, EngineConfig, KeyPrefix, KeyValueStore, NewVoucher, ReasonCode,
        RedemptionApi, RedemptionDependencies, RedemptionError, RedemptionService, RewardType,
        Token, VoucherId,
    };
    use tempfile::TempDir;

    type FileService =
        RedemptionService<Arc<FileBackedKVStore>, FileBlobStore, SystemTimeSource, OsEntropySource>;

    struct Fixture {
        service: FileService,
        kv: Arc<FileBackedKVStore>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let kv = Arc::new(FileBackedKVStore::open(dir.path().join("store.bin")).unwrap());
        let service = RedemptionService::new(
            RedemptionDependencies {
                kv_store: Arc::clone(&kv),
                blob_store: FileBlobStore::open(dir.path()).unwrap(),
                time_source: SystemTimeSource,
                entropy: OsEntropySource,
            },
            EngineConfig::default(),
        );
        Fixture {
            service,
            kv,
            _dir: dir,
        }
    }

    fn issue(service: &FileService, request: NewVoucher, count: u32) -> (VoucherId, Vec<Token>) {
        let voucher = service.create_voucher(&admin(), request).unwrap();
        service
            .generate_batch(&admin(), voucher.id, count, None)
            .unwrap();
        let tokens = service
            .list_instances(&admin(), voucher.id, 0, count as usize)
            .unwrap()
            .instances
            .into_iter()
            .map(|i| i.token)
            .collect();
        (voucher.id, tokens)
    }

    #[test]
    fn test_same_token_redeemed_once_across_threads() {
        let f = fixture();
        let (voucher_id, tokens) = issue(
            &f.service,
            NewVoucher::new("Cinema", RewardType::FreeItem, 0.0),
            1,
        );
        let token = tokens[0].as_str().to_string();

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..12u64)
                .map(|n| {
                    let service = &f.service;
                    let token = token.as_str();
                    scope.spawn(move || {
                        service.redeem(token, &operator_with_id(500 + n), Some(TINY_PNG_DATA_URL))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(
                    err,
                    RedemptionError::AlreadyRedeemed
                        | RedemptionError::InvalidState {
                            reason: ReasonCode::AlreadyRedeemed
                        }
                ),
                "unexpected error: {:?}",
                err
            );
        }

        let records = f
            .kv
            .prefix_scan(&KeyPrefix::voucher_redemptions(voucher_id))
            .unwrap();
        assert_eq!(records.len(), 1);

        let listed = f.service.list_redemptions(&admin(), 50).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].signature_path.is_some());
    }

    #[test]
    fn test_total_limit_holds_under_contention() {
        let f = fixture();
        let (_, tokens) = issue(
            &f.service,
            NewVoucher::new("Launch promo", RewardType::Percent, 15.0).with_limits(4, 0),
            16,
        );

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = tokens
                .iter()
                .enumerate()
                .map(|(n, token)| {
                    let service = &f.service;
                    scope.spawn(move || {
                        service.redeem(token.as_str(), &operator_with_id(700 + n as u64), None)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.reason(), Some(ReasonCode::LimitTotalReached), "{:?}", err);
        }
        assert_eq!(f.service.stats(&admin()).unwrap().redeemed, 4);
    }

    #[test]
    fn test_per_user_limit_holds_under_contention() {
        let f = fixture();
        let (voucher_id, tokens) = issue(
            &f.service,
            NewVoucher::new("Refill", RewardType::Fixed, 2.0).with_limits(0, 2),
            8,
        );
        let regular = operator_with_id(42);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = tokens
                .iter()
                .map(|token| {
                    let service = &f.service;
                    let caller = &regular;
                    scope.spawn(move || service.redeem(token.as_str(), caller, None))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.reason(), Some(ReasonCode::LimitUserReached), "{:?}", err);
        }

        // Another operator is unaffected by the first one's usage.
        let spare = f
            .service
            .list_instances(&admin(), voucher_id, 0, 8)
            .unwrap()
            .instances
            .into_iter()
            .find(|i| i.redeemed_at.is_none())
            .unwrap();
        f.service
            .redeem(spare.token.as_str(), &operator_with_id(43), None)
            .unwrap();
    }
}

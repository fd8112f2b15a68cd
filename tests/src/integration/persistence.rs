//! # Restart Flows
//!
//! Opens a `NodeContainer` over a file-backed data directory, closes it and
//! opens it again. Redemption state, the audit trail and signature files
//! must all survive, and a redeemed token must stay redeemed.

#[cfg(test)]
mod tests {
    use redemption_engine::adapters::FileBlobStore;
    use redemption_engine::test_utils::{admin, operator, TINY_PNG_DATA_URL};
    use redemption_engine::{
        AdministrationApi, BlobStore, LifecycleStatus, NewVoucher, ReasonCode, RedemptionApi,
        RewardType, ScanContext,
    };
    use tempfile::TempDir;
    use voucher_node::{NodeConfig, NodeContainer, StorageBackend};

    fn file_node(dir: &TempDir) -> NodeContainer {
        NodeContainer::open(NodeConfig {
            data_dir: dir.path().to_path_buf(),
            storage_backend: StorageBackend::File,
            ..NodeConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_redemption_survives_restart() {
        let dir = TempDir::new().unwrap();

        let (token, handle) = {
            let node = file_node(&dir);
            let voucher = node
                .service()
                .create_voucher(&admin(), NewVoucher::new("Brunch", RewardType::Fixed, 20.0))
                .unwrap();
            let batch = node
                .service()
                .generate_batch(&admin(), voucher.id, 3, Some(14))
                .unwrap();
            let token = batch.tokens_preview[0].clone();

            let receipt = node
                .service()
                .redeem(token.as_str(), &operator(), Some(TINY_PNG_DATA_URL))
                .unwrap();
            (token, receipt.signature_path.unwrap())
        };

        let node = file_node(&dir);
        let verdict = node
            .service()
            .validate(token.as_str(), &operator(), &ScanContext::new("10.0.0.9", "kiosk"))
            .unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.reason, ReasonCode::AlreadyRedeemed);

        let err = node
            .service()
            .redeem(token.as_str(), &operator(), None)
            .unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::AlreadyRedeemed));

        let history = node.service().list_redemptions(&admin(), 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].token, token);
        assert_eq!(history[0].signature_path.as_ref(), Some(&handle));

        let blobs = FileBlobStore::open(dir.path()).unwrap();
        assert!(blobs.exists(&handle).unwrap());
        assert!(blobs.resolve(&handle).unwrap().is_file());

        let stats = node.service().stats(&admin()).unwrap();
        assert_eq!((stats.vouchers, stats.instances, stats.redeemed), (1, 3, 1));
    }

    #[test]
    fn test_status_and_scans_survive_restart() {
        let dir = TempDir::new().unwrap();

        let token = {
            let node = file_node(&dir);
            let voucher = node
                .service()
                .create_voucher(&admin(), NewVoucher::new("Gift", RewardType::Free, 0.0))
                .unwrap();
            let token = node
                .service()
                .generate_batch(&admin(), voucher.id, 1, None)
                .unwrap()
                .tokens_preview[0]
                .clone();
            node.service()
                .set_instance_status(&admin(), token.as_str(), LifecycleStatus::Paused)
                .unwrap();
            node.service()
                .validate(token.as_str(), &operator(), &ScanContext::new("10.0.0.1", "app"))
                .unwrap();
            token
        };

        let node = file_node(&dir);
        let err = node
            .service()
            .redeem(token.as_str(), &operator(), None)
            .unwrap_err();
        assert_eq!(err.reason(), Some(ReasonCode::InstancePaused));

        let scans = node.service().list_scans(&admin(), 10).unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].token, token.as_str());
        assert_eq!(scans[0].ip, "10.0.0.1");
    }
}

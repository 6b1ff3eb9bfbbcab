use std::sync::Arc;

use alloy::primitives::{address, Address};
use cerc20_lib::config::{DEVNET_CHAIN_ID, HARDHAT_CHAIN_ID, SEPOLIA_CHAIN_ID};
use cerc20_lib::encoding::{from_hex_string, to_hex_string};
use cerc20_lib::mock::{dev_signer, CiphertextDb, MockEngineFactory, MockLedger, MockWallet};
use cerc20_lib::{
    BalanceController, BuildMode, ConnectionManager, DecryptedBalance, EngineHandle, FixedDeployment, Phase,
    RevealedSecret,
};

const TOKEN: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
const RECIPIENT: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

struct Harness {
    wallet: Arc<MockWallet>,
    manager: ConnectionManager,
    ledger: Arc<MockLedger>,
    db: CiphertextDb,
}

fn harness(mode: BuildMode, chain_id: &str) -> Harness {
    let db = CiphertextDb::new();
    let wallet = Arc::new(MockWallet::new(chain_id).with_signer(dev_signer(0).unwrap()));
    let manager = ConnectionManager::new(mode, EngineHandle::new(Arc::new(MockEngineFactory::new(db.clone()))));
    let ledger = Arc::new(MockLedger::new(db.clone(), TOKEN, 31337).with_secret(1234, 2));
    Harness {
        wallet,
        manager,
        ledger,
        db,
    }
}

async fn ready_controller(h: &mut Harness) -> BalanceController {
    h.manager.initialize(Some(h.wallet.clone())).await.unwrap();
    h.manager.connect().await.unwrap();
    let session = h.manager.session().expect("connection should be ready");

    let mut controller = BalanceController::new(h.manager.mode(), session, h.ledger.clone());
    let deployment = FixedDeployment {
        mode: h.manager.mode(),
        address: TOKEN,
    };
    assert!(controller.load_contract_address(&deployment));
    controller.refresh_encrypted_balance().await.unwrap();
    controller
}

#[tokio::test]
async fn network_is_valid_only_on_the_authorized_chain() {
    let chains = [
        SEPOLIA_CHAIN_ID,
        "0xAA36A7",
        DEVNET_CHAIN_ID,
        HARDHAT_CHAIN_ID,
        "0x7A69",
        "0x1",
    ];
    for mode in [BuildMode::Production, BuildMode::Mocked] {
        let mut h = harness(mode, "0x1");
        h.manager.initialize(Some(h.wallet.clone())).await.unwrap();

        for chain in chains {
            h.wallet.set_chain(chain);
            let valid = h.manager.revalidate_network().await.unwrap();
            let expected = chain.eq_ignore_ascii_case(mode.authorized_chain_id());
            assert_eq!(valid, expected, "{mode} on {chain}");
            assert_eq!(h.manager.state().valid_network, expected);
            assert_eq!(h.manager.state().engine_ready, expected);
        }
    }
}

#[tokio::test]
async fn connected_tracks_the_latest_account_list() {
    let mut h = harness(BuildMode::Mocked, HARDHAT_CHAIN_ID);
    h.manager.initialize(Some(h.wallet.clone())).await.unwrap();

    let a = Address::repeat_byte(0xa1);
    let b = Address::repeat_byte(0xb2);
    let sequences: Vec<Vec<Address>> = vec![vec![a], vec![], vec![b, a], vec![a, b], vec![]];
    for accounts in sequences {
        h.wallet.change_accounts(accounts.clone());
        h.manager.drain_events().await.unwrap();

        let state = h.manager.state();
        assert_eq!(state.connected, !accounts.is_empty());
        assert_eq!(state.account, accounts.first().copied());
    }
    assert_eq!(h.manager.phase(), Phase::Disconnected);
}

#[test]
fn hex_round_trips_byte_sequences_with_zeros() {
    let samples: [&[u8]; 5] = [&[0], &[0, 0], &[0, 1, 0], &[0xff, 0, 0x10], &[7; 100]];
    for bytes in samples {
        let encoded = to_hex_string(bytes);
        assert_eq!(encoded, encoded.to_lowercase());
        assert_eq!(encoded.len(), 2 + bytes.len() * 2);
        assert_eq!(from_hex_string(&encoded).unwrap(), bytes);
    }
}

#[tokio::test]
async fn recipient_validation() {
    let mut h = harness(BuildMode::Mocked, HARDHAT_CHAIN_ID);
    let mut controller = ready_controller(&mut h).await;

    controller
        .confirm_transfer_address(" 0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB ")
        .unwrap();
    assert_eq!(controller.chosen_address_display(), RECIPIENT.to_checksum(None));
    assert_eq!(controller.error_message(), None);

    for bad in ["", "0x", "hello", "0xBBBB", "0xgggggggggggggggggggggggggggggggggggggggg"] {
        assert!(controller.confirm_transfer_address(bad).is_err(), "{bad:?}");
        assert_eq!(controller.chosen_address_display(), "0x");
        assert!(!controller.error_message().unwrap_or_default().is_empty());
    }
}

#[tokio::test]
async fn uninitialized_balance_decrypts_to_zero() {
    let mut h = harness(BuildMode::Mocked, HARDHAT_CHAIN_ID);
    let mut controller = ready_controller(&mut h).await;

    assert_eq!(controller.decrypted_balance(), DecryptedBalance::Unknown);
    controller.decrypt().await.unwrap();
    assert_eq!(controller.decrypted_balance().to_string(), "0");
}

#[tokio::test]
async fn secret_polling_disables_controls_once_revealed() {
    let mut h = harness(BuildMode::Mocked, HARDHAT_CHAIN_ID);
    let mut controller = ready_controller(&mut h).await;

    controller.request_secret_reveal().await.unwrap();
    assert_eq!(controller.poll_revealed_secret().await.unwrap().to_string(), "???");
    assert_eq!(controller.poll_revealed_secret().await.unwrap().to_string(), "???");
    assert!(controller.can_refresh_secret());

    let revealed = controller.poll_revealed_secret().await.unwrap();
    assert_eq!(revealed, RevealedSecret::Revealed(1234));
    assert_eq!(revealed.to_string(), "1234");
    assert!(!controller.can_request_reveal());
    assert!(!controller.can_refresh_secret());
}

#[tokio::test]
async fn encrypt_then_transfer_end_to_end() {
    let mut h = harness(BuildMode::Mocked, SEPOLIA_CHAIN_ID);
    let account = dev_signer(0).unwrap().address();
    h.ledger.mint(account, 100);

    let mut controller = ready_controller(&mut h).await;
    assert_eq!(h.wallet.switch_requests(), vec![HARDHAT_CHAIN_ID.to_string()]);
    assert_eq!(controller.account(), account);

    controller.encrypt(42).await.unwrap();
    let encrypted = controller.encrypted_amount().cloned().unwrap();
    assert_eq!(encrypted.handles.len(), 1);
    assert_eq!(h.db.value(&encrypted.handles[0]), Some(42));

    controller
        .confirm_transfer_address(&RECIPIENT.to_string())
        .unwrap();
    assert!(controller.can_transfer());

    let reads_before = h.ledger.calls().balance_of;
    let tx = controller.transfer().await.unwrap();
    assert!(tx.is_some());

    let calls = h.ledger.calls();
    assert_eq!(calls.transfers.len(), 1);
    let args = &calls.transfers[0];
    assert_eq!(args.recipient, RECIPIENT);
    assert_eq!(args.handle, to_hex_string(encrypted.handles[0].as_slice()));
    assert_eq!(args.proof, to_hex_string(&encrypted.proof));
    assert_eq!(calls.balance_of, reads_before + 1);

    assert_eq!(h.ledger.clear_balance(&account), 58);
    assert_eq!(h.ledger.clear_balance(&RECIPIENT), 42);

    controller.decrypt().await.unwrap();
    assert_eq!(controller.decrypted_balance(), DecryptedBalance::Known(58));
}

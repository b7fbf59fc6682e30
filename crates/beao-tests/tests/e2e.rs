//! End-to-end wallet scenarios through the `Wallet` facade.
//!
//! Chain data arrives as `ChainUpdate`s exactly as the node collaborator
//! would deliver it; spends go out through the `SimNet` broadcaster.

use std::time::Duration;

use beao_core::crypto::verify_transaction_input;
use beao_core::types::*;
use beao_tests::helpers::*;
use beao_wallet::store::{ENCRYPTED_MIN_VERSION, PLAIN_MIN_VERSION};
use beao_wallet::{
    ChainUpdate, ErrorCode, FileStore, LockState, Recipient, SendOptions, TxKind, TxStatus, Wallet, WalletError,
    WalletStore,
};

#[test]
fn send_forty_of_a_hundred() {
    let tw = test_wallet();
    let funding = fund(&tw, 1, 100);
    let to = foreign(0xA0);

    let txid = tw.wallet.send(vec![Recipient::new(to.clone(), 40)], SendOptions::default()).unwrap();

    let accepted = tw.net.accepted();
    assert_eq!(accepted.len(), 1);
    let tx = &accepted[0];
    assert_eq!(tx.txid().unwrap(), txid);
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.inputs[0].previous_output, OutPoint::new(funding, 0));
    assert_eq!(tx.outputs[0], TxOutput { value: 40, pubkey_hash: to.pubkey_hash() });
    assert_eq!(tx.outputs[1].value, 59);

    let history = tw.wallet.transactions();
    let sent = history.iter().find(|s| s.txid == txid).unwrap();
    assert_eq!(sent.kind, TxKind::Sent);
    assert_eq!(sent.fee, 1);
    assert_eq!(sent.net, -41);

    // The funding output was paid to a key the wallet issued.
    let owner = history.iter().find(|s| s.txid == funding).unwrap();
    assert_eq!(owner.kind, TxKind::Received);
    for (i, input) in tx.inputs.iter().enumerate() {
        assert!(input.is_signed());
        let pk = beao_core::crypto::PublicKey::from_slice(&input.public_key).unwrap();
        assert!(verify_transaction_input(tx, i, &pk.pubkey_hash()).is_ok());
    }

    // Change is ours and spendable right away.
    let balance = tw.wallet.balance();
    assert_eq!(balance.confirmed, 59);
}

#[test]
fn duplicate_recipient_reserves_nothing() {
    let tw = test_wallet();
    fund(&tw, 1, 100);
    let to = foreign(0xA0);

    let err = tw
        .wallet
        .send(vec![Recipient::new(to.clone(), 10), Recipient::new(to.clone(), 20)], SendOptions::default())
        .unwrap_err();
    assert!(matches!(err, WalletError::DuplicateRecipient(_)));
    assert_eq!(err.code(), ErrorCode::DuplicateRecipient);
    assert!(tw.net.accepted().is_empty());

    // The coin is still free for the next send.
    tw.wallet.send(vec![Recipient::new(to, 30)], SendOptions::default()).unwrap();
}

#[test]
fn exceeding_balance_by_the_fee() {
    let tw = test_wallet();
    fund(&tw, 1, 100);

    let err = tw.wallet.send(vec![Recipient::new(foreign(0xA0), 100)], SendOptions::default()).unwrap_err();
    assert_eq!(err, WalletError::InsufficientFunds { requested: 100, available: 100, fee: Some(1) });
    assert_eq!(err.to_string(), "The total exceeds your balance when the 1 beo transaction fee is included.");

    let err = tw.wallet.send(vec![Recipient::new(foreign(0xA0), 101)], SendOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "The amount exceeds your balance.");
    assert_eq!(err.code().as_str(), "insufficient_funds");
}

#[test]
fn zero_amount_is_invalid() {
    let tw = test_wallet();
    fund(&tw, 1, 100);
    let err = tw.wallet.send(vec![Recipient::new(foreign(0xA0), 0)], SendOptions::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidAmount);
}

#[test]
fn large_transaction_needs_fee_confirmation() {
    let tw = test_wallet();
    fund_many(&tw, 1, &[10; 80], 1);
    let recipients = vec![Recipient::new(foreign(0xA0), 780)];

    let err = tw.wallet.send(recipients.clone(), SendOptions::default()).unwrap_err();
    assert_eq!(err, WalletError::FeeConfirmationRequired { fee: 12 });
    assert!(tw.net.accepted().is_empty());

    let txid = tw.wallet.send(recipients, SendOptions { confirm_fee: true, ..SendOptions::default() }).unwrap();
    let tx = tw.net.accepted().pop().unwrap();
    assert_eq!(tx.txid().unwrap(), txid);
    assert_eq!(tx.inputs.len(), 80);
}

#[test]
fn fee_override_is_paid_exactly() {
    let tw = test_wallet();
    fund(&tw, 1, 1_000);
    tw.wallet
        .send(vec![Recipient::new(foreign(0xA0), 500)], SendOptions { fee_override: Some(25), ..SendOptions::default() })
        .unwrap();
    let tx = tw.net.accepted().pop().unwrap();
    assert_eq!(tx.total_output_value(), Some(975));
}

#[test]
fn network_rejection_is_reported_and_rolled_back() {
    let tw = test_wallet();
    fund(&tw, 1, 100);
    tw.net.reject("non-final");

    let err = tw.wallet.send(vec![Recipient::new(foreign(0xA0), 40)], SendOptions::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TransactionRejected);
    assert_eq!(tw.wallet.transactions().len(), 1);

    tw.net.accept();
    tw.wallet.send(vec![Recipient::new(foreign(0xA0), 40)], SendOptions::default()).unwrap();
}

#[test]
fn mined_output_matures_at_depth_120() {
    let tw = test_wallet();
    let txid = mine_to_wallet(&tw, 50, 1);

    set_tip(&tw.wallet, &tw.clock, 119);
    assert_eq!(tw.wallet.transaction_status(&txid).unwrap(), TxStatus::Immature { matures_in: 1 });
    assert_eq!(tw.wallet.balance().immature, 50);
    let err = tw.wallet.send(vec![Recipient::new(foreign(0xA0), 10)], SendOptions::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientFunds);

    set_tip(&tw.wallet, &tw.clock, 120);
    assert_eq!(tw.wallet.transaction_status(&txid).unwrap(), TxStatus::Confirmed { depth: 120 });
    assert_eq!(tw.wallet.balance().confirmed, 50);
    tw.wallet.send(vec![Recipient::new(foreign(0xA0), 10)], SendOptions::default()).unwrap();
}

#[test]
fn orphaned_mined_block_is_not_accepted() {
    let tw = test_wallet();
    let txid = mine_to_wallet(&tw, 50, 10);
    tw.wallet.apply_chain_update(ChainUpdate::Orphaned { txid }).unwrap();
    assert_eq!(tw.wallet.transaction_status(&txid).unwrap(), TxStatus::Immature { matures_in: 120 });
    tw.clock.advance(600);
    assert_eq!(tw.wallet.transaction_status(&txid).unwrap(), TxStatus::NotAccepted);
    assert_eq!(tw.wallet.balance().total(), 0);
}

#[test]
fn locked_wallet_rejects_spends_and_signing() {
    let tw = test_wallet();
    let addr = tw.wallet.generate_address("me").unwrap();
    fund(&tw, 1, 100);
    tw.wallet.encrypt("correct horse").unwrap();

    assert_eq!(tw.wallet.lock_state(), LockState::Locked);
    let err = tw.wallet.send(vec![Recipient::new(foreign(0xA0), 10)], SendOptions::default()).unwrap_err();
    assert_eq!(err, WalletError::Locked);
    assert_eq!(tw.wallet.generate_address("x"), Err(WalletError::Locked));
    assert_eq!(tw.wallet.unlock("wrong", None), Err(WalletError::WrongPassphrase));
    assert_eq!(tw.wallet.lock_state(), LockState::Locked);

    tw.wallet.unlock("correct horse", None).unwrap();
    let sig = tw.wallet.sign_message(&addr, "mine").unwrap();
    assert_eq!(tw.wallet.verify_message(&addr, "mine", &sig), Ok(true));
    tw.wallet.lock().unwrap();
    assert_eq!(tw.wallet.sign_message(&addr, "mine"), Err(WalletError::Locked));
}

#[test]
fn unlock_expires() {
    let tw = test_wallet();
    let addr = tw.wallet.generate_address("me").unwrap();
    tw.wallet.encrypt("pw").unwrap();
    tw.wallet.unlock("pw", Some(Duration::from_millis(100))).unwrap();
    assert!(matches!(tw.wallet.lock_state(), LockState::Unlocked { until: Some(_) }));

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(tw.wallet.sign_message(&addr, "late"), Err(WalletError::Locked));
    assert_eq!(tw.wallet.lock_state(), LockState::Locked);
}

#[test]
fn message_verification_needs_no_keys() {
    let signer = test_wallet();
    let addr = signer.wallet.generate_address("signer").unwrap();
    let sig = signer.wallet.sign_message(&addr, "hello").unwrap();

    let other = test_wallet_with(test_config(), [1; 32]);
    assert_eq!(other.wallet.verify_message(&addr, "hello", &sig), Ok(true));
    assert_eq!(other.wallet.verify_message(&addr, "hello?", &sig), Ok(false));
    assert_eq!(other.wallet.recover_signer("hello", &sig).unwrap(), Some((addr.clone(), None)));

    other.wallet.import_sending_address(addr.clone(), "friend").unwrap();
    assert_eq!(other.wallet.recover_signer("hello", &sig).unwrap(), Some((addr, Some("friend".into()))));
    assert!(matches!(other.wallet.verify_message(&foreign(1), "hello", "nothex"), Err(WalletError::MalformedSignature(_))));
}

#[test]
fn address_book_rules() {
    let tw = test_wallet();
    let mine = tw.wallet.generate_address("savings").unwrap();
    let theirs = foreign(0xB0);
    tw.wallet.import_sending_address(theirs.clone(), "shop").unwrap();

    assert_eq!(
        tw.wallet.import_sending_address(theirs.clone(), "again"),
        Err(WalletError::DuplicateAddress(theirs.to_string()))
    );
    assert_eq!(tw.wallet.delete_sending_address(&mine).unwrap_err().code(), ErrorCode::CannotDeleteReceiving);
    tw.wallet.set_label(&theirs, "grocer").unwrap();
    tw.wallet.delete_sending_address(&theirs).unwrap();
    assert!(tw.wallet.address_book().iter().all(|e| e.address != theirs));
}

#[test]
fn failed_save_leaves_state_unchanged() {
    let tw = test_wallet();
    let book = tw.wallet.address_book();
    tw.store.set_fail_saves(true);
    assert_eq!(tw.wallet.generate_address("x").unwrap_err().code(), ErrorCode::Persistence);
    assert_eq!(tw.wallet.address_book(), book);
}

#[test]
fn file_backed_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.dat");
    let config = test_config();

    let wallet = Wallet::open(config.clone(), FileStore::new(&path), SimNet::default()).unwrap();
    let addr = wallet.generate_address("first").unwrap();
    assert_eq!(FileStore::new(&path).load().unwrap().unwrap().min_version(), PLAIN_MIN_VERSION);
    wallet.encrypt("pw").unwrap();
    drop(wallet);

    let reopened = Wallet::open(config.clone(), FileStore::new(&path), SimNet::default()).unwrap();
    assert_eq!(reopened.lock_state(), LockState::Locked);
    assert!(reopened.address_book().iter().any(|e| e.address == addr));
    reopened.unlock("pw", None).unwrap();
    reopened.decrypt("pw").unwrap();
    assert_eq!(reopened.lock_state(), LockState::Unencrypted);

    // The format never drops back below the encrypted minimum.
    let record = FileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(record.min_version(), ENCRYPTED_MIN_VERSION);

    let backup = dir.path().join("backup.dat");
    reopened.backup(&backup).unwrap();
    assert_eq!(FileStore::new(&backup).load().unwrap(), Some(record));
}

#[test]
fn sync_progress_through_catch_up() {
    let tw = test_wallet();
    tw.wallet.apply_chain_update(ChainUpdate::EstimatedTotal(1_000)).unwrap();
    tw.wallet.apply_chain_update(ChainUpdate::Tip { height: 250, block_time: T0 - 3 * 3_600 }).unwrap();

    let p = tw.wallet.sync_progress();
    assert_eq!(p.phase, beao_wallet::SyncPhase::CatchingUp);
    assert_eq!(p.progress, 0.25);
    assert_eq!(p.last_block_age.unwrap().to_string(), "3 hours ago");

    tw.wallet.apply_chain_update(ChainUpdate::Tip { height: 1_000, block_time: T0 - 30 }).unwrap();
    assert_eq!(tw.wallet.sync_progress().phase, beao_wallet::SyncPhase::UpToDate);
}

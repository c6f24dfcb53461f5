use platarium_slashing::core::keys;
use platarium_slashing::*;
use std::time::Duration;

const POWER: i64 = 100;

fn time_at(height: i64) -> Timestamp {
    Timestamp::from_seconds(height * 5)
}

fn header(height: i64) -> BlockHeader {
    BlockHeader::new(height, time_at(height))
}

struct Validator {
    operator: ValAddress,
    cons: ConsAddress,
}

fn new_keeper<S: KvStore>(store: S, params: &Params) -> Keeper<S, InMemoryStaking> {
    let mut keeper = Keeper::new(
        store,
        InMemoryStaking::new(Duration::from_secs(3600)),
        KeeperConfig::default(),
    );
    keeper.set_params(params).unwrap();
    keeper
}

fn bond<S: KvStore>(keeper: &mut Keeper<S, InMemoryStaking>, seed: u8, height: i64) -> Validator {
    let operator = ValAddress::from([seed; 20]);
    let pubkey = ConsPubKey::new(vec![seed; 32]);
    let cons = pubkey.address();
    keeper
        .staking_mut()
        .add_validator(operator.clone(), pubkey, 1_000_000, 1)
        .unwrap();
    keeper.after_validator_created(header(height), &operator).unwrap();
    keeper
        .after_validator_bonded(header(height), &cons, &operator)
        .unwrap();
    Validator { operator, cons }
}

fn block<S: KvStore>(keeper: &mut Keeper<S, InMemoryStaking>, height: i64, cons: &ConsAddress, signed: bool) {
    let vote = if signed {
        VoteInfo::signed(cons.clone(), POWER)
    } else {
        VoteInfo::absent(cons.clone(), POWER)
    };
    keeper.begin_block(header(height), &[vote], &[]).unwrap();
}

fn info<S: KvStore>(keeper: &Keeper<S, InMemoryStaking>, cons: &ConsAddress) -> SigningInfo {
    keeper.query_signing_info(cons).unwrap()
}

#[test]
fn test_scenarios_downtime_and_unjail() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    let v = bond(&mut k, 1, 0);

    // S1: sign every block of the first window.
    for h in 1..=100 {
        block(&mut k, h, &v.cons, true);
    }
    assert_eq!(info(&k, &v.cons).missed_blocks_counter, 0);
    assert!(!k.staking().is_jailed(&v.cons));

    // S2: 50 misses is exactly max_missed.
    for h in 101..=150 {
        block(&mut k, h, &v.cons, false);
    }
    assert_eq!(info(&k, &v.cons).missed_blocks_counter, 50);
    assert_eq!(k.missed_block_count(&v.cons).unwrap(), 50);
    assert!(!k.staking().is_jailed(&v.cons));

    // S3: the 51st miss jails.
    block(&mut k, 151, &v.cons, false);
    let slashes = k.staking().slashes();
    assert_eq!(slashes.len(), 1);
    assert_eq!(slashes[0].distribution_height, 149);
    assert_eq!(slashes[0].power, POWER);
    assert_eq!(slashes[0].fraction, Dec::percent(1).unwrap());
    assert_eq!(slashes[0].reason, Infraction::Downtime);
    assert!(k.staking().is_jailed(&v.cons));

    let jailed = info(&k, &v.cons);
    let jailed_until = time_at(151).saturating_add(Duration::from_secs(600));
    assert_eq!(jailed.jailed_until, jailed_until);
    assert_eq!(jailed.missed_blocks_counter, 0);
    assert_eq!(jailed.index_offset, 0);
    assert_eq!(k.missed_block_count(&v.cons).unwrap(), 0);
    assert!(k
        .store()
        .prefix_scan(&keys::missed_bitmap_prefix(&v.cons))
        .unwrap()
        .is_empty());

    // S4: too early, then just after the jail period.
    let early = BlockHeader::new(152, time_at(150).saturating_add(Duration::from_secs(300)));
    assert_eq!(
        k.unjail(early, &v.operator),
        Err(SlashingError::StillJailed(v.operator.clone()))
    );
    let late = BlockHeader::new(272, jailed_until.saturating_add(Duration::from_secs(1)));
    k.unjail(late, &v.operator).unwrap();
    assert!(!k.staking().is_jailed(&v.cons));
    assert_eq!(k.staking().unjail_count(), 1);

    // The validator resumes from a fresh window.
    block(&mut k, 273, &v.cons, true);
    assert_eq!(info(&k, &v.cons).index_offset, 1);

    println!("OK: downtime scenarios passed");
}

#[test]
fn test_scenario_double_sign() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    let v = bond(&mut k, 2, 0);
    for h in 1..200 {
        block(&mut k, h, &v.cons, true);
    }

    // S5
    let evidence = Evidence {
        address: v.cons.clone(),
        height: 180,
        time: time_at(180),
        power: 100,
    };
    k.begin_block(header(200), &[VoteInfo::signed(v.cons.clone(), POWER)], &[evidence])
        .unwrap();

    let slash = &k.staking().slashes()[0];
    assert_eq!(slash.distribution_height, 178);
    assert_eq!(slash.power, 100);
    assert_eq!(slash.fraction, Dec::percent(5).unwrap());
    assert_eq!(slash.reason, Infraction::DoubleSign);
    assert!(k.staking().is_jailed(&v.cons));

    let record = info(&k, &v.cons);
    assert!(record.tombstoned);
    assert_eq!(record.jailed_until, Timestamp::MAX);

    let far_future = BlockHeader::new(10_000, Timestamp::from_seconds(MAX_TIMESTAMP_SECONDS));
    assert_eq!(
        k.unjail(far_future, &v.operator),
        Err(SlashingError::StillJailed(v.operator.clone()))
    );

    let slash_event = k
        .events()
        .iter()
        .find(|e| e.kind == EVENT_TYPE_SLASH)
        .unwrap();
    assert_eq!(slash_event.attribute("reason"), Some(ATTRIBUTE_VALUE_DOUBLE_SIGN));
}

#[test]
fn test_scenario_new_bond_window_boundary() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    // S6
    let v2 = bond(&mut k, 3, 500);
    for h in 501..=600 {
        block(&mut k, h, &v2.cons, false);
    }
    assert_eq!(info(&k, &v2.cons).missed_blocks_counter, 100);
    assert!(!k.staking().is_jailed(&v2.cons));

    block(&mut k, 601, &v2.cons, false);
    assert!(k.staking().is_jailed(&v2.cons));
    assert_eq!(k.staking().slashes()[0].distribution_height, 599);
}

#[test]
fn test_never_jailed_before_window_passes() {
    let params = Params {
        signed_blocks_window: 10,
        ..Params::default()
    };
    let mut k = new_keeper(MemStore::new(), &params);
    let v = bond(&mut k, 4, 3);
    for h in 4..=13 {
        block(&mut k, h, &v.cons, false);
        assert!(!k.staking().is_jailed(&v.cons), "jailed early at {}", h);
    }
    block(&mut k, 14, &v.cons, false);
    assert!(k.staking().is_jailed(&v.cons));
}

#[test]
fn test_window_of_one() {
    let params = Params {
        signed_blocks_window: 1,
        min_signed_per_window: Dec::ONE,
        ..Params::default()
    };
    let mut k = new_keeper(MemStore::new(), &params);
    let v = bond(&mut k, 5, 0);
    block(&mut k, 1, &v.cons, true);
    assert!(!k.staking().is_jailed(&v.cons));
    block(&mut k, 2, &v.cons, false);
    assert!(k.staking().is_jailed(&v.cons));
}

#[test]
fn test_votes_are_handled_before_evidence() {
    let params = Params {
        signed_blocks_window: 10,
        ..Params::default()
    };
    let mut k = new_keeper(MemStore::new(), &params);
    let v = bond(&mut k, 6, 0);
    for h in 1..=10 {
        block(&mut k, h, &v.cons, false);
    }
    let evidence = Evidence {
        address: v.cons.clone(),
        height: 9,
        time: time_at(9),
        power: POWER,
    };
    k.begin_block(header(11), &[VoteInfo::absent(v.cons.clone(), POWER)], &[evidence])
        .unwrap();

    let reasons: Vec<Infraction> = k.staking().slashes().iter().map(|s| s.reason).collect();
    assert_eq!(reasons, vec![Infraction::Downtime, Infraction::DoubleSign]);
    // Jailed once by downtime; equivocation only tombstones.
    assert_eq!(k.staking().jail_count(), 1);
    assert!(k.is_tombstoned(&v.cons).unwrap());
    assert_eq!(info(&k, &v.cons).jailed_until, Timestamp::MAX);
}

#[test]
fn test_unknown_validator_aborts_block() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    let v = bond(&mut k, 7, 0);
    let before = k.store().clone();

    let stranger = ConsAddress::from([99u8; 20]);
    let votes = vec![
        VoteInfo::absent(v.cons.clone(), POWER),
        VoteInfo::signed(stranger.clone(), POWER),
    ];
    let err = k.begin_block(header(1), &votes, &[]).unwrap_err();
    assert_eq!(err, SlashingError::UnknownValidator(stranger));
    assert!(err.is_fatal());

    assert_eq!(k.store(), &before);
    assert!(k.events().is_empty());
    assert_eq!(info(&k, &v.cons).index_offset, 0);
}

#[derive(Default)]
struct FailingStore {
    inner: MemStore,
    fail_reads_of: Option<Vec<u8>>,
}

impl KvStore for FailingStore {
    fn get(&self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        if self.fail_reads_of.as_deref() == Some(key) {
            return Err(StoreError::Backend("disk read failed".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> std::result::Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> std::result::Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> std::result::Result<Vec<KvPair>, StoreError> {
        self.inner.prefix_scan(prefix)
    }
}

#[test]
fn test_store_failure_discards_block() {
    let mut k = new_keeper(FailingStore::default(), &Params::default());
    let v1 = bond(&mut k, 8, 0);
    let v2 = bond(&mut k, 9, 0);
    let before = k.store().inner.clone();

    k.store_mut().fail_reads_of = Some(keys::signing_info_key(&v2.cons));
    let votes = vec![
        VoteInfo::absent(v1.cons.clone(), POWER),
        VoteInfo::signed(v2.cons.clone(), POWER),
    ];
    let err = k.begin_block(header(1), &votes, &[]).unwrap_err();
    assert!(matches!(err, SlashingError::StoreFailure(_)));
    assert_eq!(k.store().inner, before);
    assert!(k.events().is_empty());

    k.store_mut().fail_reads_of = None;
    k.begin_block(header(1), &votes, &[]).unwrap();
    assert_eq!(info(&k, &v1.cons).missed_blocks_counter, 1);
    assert_eq!(info(&k, &v1.cons).index_offset, 1);
    assert_eq!(k.events().len(), 1);
    assert_eq!(k.events()[0].kind, EVENT_TYPE_LIVENESS);
}

#[test]
fn test_tombstone_survives_validator_removal() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    let v = bond(&mut k, 10, 0);
    let evidence = Evidence {
        address: v.cons.clone(),
        height: 1,
        time: time_at(1),
        power: POWER,
    };
    k.handle_equivocation(header(2), &evidence).unwrap();

    k.after_validator_removed(header(3), &v.cons, &v.operator).unwrap();
    k.staking_mut().remove_validator(&v.operator);

    assert!(k.pubkey(&v.cons).is_err());
    assert!(k.is_tombstoned(&v.cons).unwrap());

    // Rebonding the same key keeps the tombstone.
    let pubkey = ConsPubKey::new(vec![10u8; 32]);
    k.staking_mut()
        .add_validator(v.operator.clone(), pubkey, 1_000_000, 1)
        .unwrap();
    k.after_validator_created(header(4), &v.operator).unwrap();
    k.after_validator_bonded(header(4), &v.cons, &v.operator).unwrap();
    assert!(info(&k, &v.cons).tombstoned);
}

#[test]
fn test_repeated_bit_write_counts_once() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    let cons = ConsAddress::from([11u8; 20]);
    k.set_missed_block_bit(&cons, 7, true).unwrap();
    k.set_missed_block_bit(&cons, 7, true).unwrap();
    assert_eq!(k.missed_block_count(&cons).unwrap(), 1);
    assert!(k.missed_block_bit(&cons, 7).unwrap());
    k.delete_missed_blocks(&cons).unwrap();
    assert_eq!(k.missed_block_count(&cons).unwrap(), 0);
}

#[test]
fn test_signing_infos_paginated() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    for seed in 20..25u8 {
        bond(&mut k, seed, 0);
    }
    let page = k.query_signing_infos(PageRequest { offset: 0, limit: 2 }).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.infos.len(), 2);
    let all = k.walk_signing_infos().unwrap();
    assert_eq!(page.infos[0], all[0].1);
    assert_eq!(page.infos[1], all[1].1);
}

#[test]
fn test_rebond_after_unjail_gets_a_full_window() {
    let mut k = new_keeper(MemStore::new(), &Params::default());
    let v = bond(&mut k, 30, 0);
    for h in 1..=100 {
        block(&mut k, h, &v.cons, true);
    }
    for h in 101..=151 {
        block(&mut k, h, &v.cons, false);
    }
    assert!(k.staking().is_jailed(&v.cons));

    let jailed_until = info(&k, &v.cons).jailed_until;
    let late = BlockHeader::new(272, jailed_until.saturating_add(Duration::from_secs(1)));
    k.unjail(late, &v.operator).unwrap();
    k.after_validator_bonded(header(273), &v.cons, &v.operator).unwrap();

    let rebonded = info(&k, &v.cons);
    assert_eq!(rebonded.start_height, 273);
    assert_eq!(rebonded.index_offset, 0);
    assert_eq!(rebonded.jailed_until, jailed_until);

    // Well past max_missed, but still inside the first window after rebonding.
    for h in 274..=373 {
        block(&mut k, h, &v.cons, false);
        assert!(!k.staking().is_jailed(&v.cons), "rejailed inside fresh window at {}", h);
    }
    assert_eq!(k.staking().jail_count(), 1);

    block(&mut k, 374, &v.cons, false);
    assert!(k.staking().is_jailed(&v.cons));
    assert_eq!(k.staking().jail_count(), 2);

    println!("OK: rebond window passed");
}

#[test]
fn test_window_spanning_chunks() {
    let window = 1500;
    assert!(window as u64 > CHUNK_SIZE);
    assert_ne!(window as u64 % CHUNK_SIZE, 0);
    let params = Params {
        signed_blocks_window: window,
        ..Params::default()
    };
    let mut k = new_keeper(MemStore::new(), &params);
    let steady = bond(&mut k, 31, 0);
    let offline = bond(&mut k, 32, 0);

    for h in 1..=3200i64 {
        let steady_vote = if h % 3 == 0 {
            VoteInfo::absent(steady.cons.clone(), POWER)
        } else {
            VoteInfo::signed(steady.cons.clone(), POWER)
        };
        let votes = vec![steady_vote, VoteInfo::absent(offline.cons.clone(), POWER)];
        k.begin_block(header(h), &votes, &[]).unwrap();

        for v in [&steady, &offline] {
            assert_eq!(
                info(&k, &v.cons).missed_blocks_counter,
                k.missed_block_count(&v.cons).unwrap(),
                "counter drift at height {}",
                h
            );
        }
        if h >= window {
            // Any 1500 consecutive heights hold exactly 500 multiples of three.
            assert_eq!(info(&k, &steady.cons).missed_blocks_counter, 500);
        }
        if h == window {
            assert!(!k.staking().is_jailed(&offline.cons));
            assert_eq!(info(&k, &offline.cons).missed_blocks_counter, window);
        }
        if h == window + 1 {
            assert!(k.staking().is_jailed(&offline.cons));
        }
    }

    assert!(!k.staking().is_jailed(&steady.cons));
    assert_eq!(info(&k, &steady.cons).index_offset, 3200);
    assert_eq!(k.staking().slashes().len(), 1);
}

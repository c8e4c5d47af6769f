use lexicon_core::{
    Actor, ActorId, ClientReconciler, Definition, DefinitionId, DefinitionListQuery,
    InMemoryScoreAggregator, InMemoryVoteLedger, NewDefinition, RepoError, RepoResult,
    ScoreAggregator, Tally, TallyDelta, UserVote, VoteError, VoteLedger, VoteService, VoteValue,
};
use std::error::Error;
use uuid::Uuid;

/// Aggregator whose counter writes fail after the ledger write succeeded.
struct UnavailableAggregator;

impl ScoreAggregator for UnavailableAggregator {
    fn apply_delta(&self, _definition_id: DefinitionId, _delta: TallyDelta) -> RepoResult<()> {
        Err(RepoError::InvalidData("counter store unavailable".to_string()))
    }

    fn tally(&self, _definition_id: DefinitionId) -> RepoResult<Option<Tally>> {
        Ok(None)
    }

    fn get_definition(&self, _definition_id: DefinitionId) -> RepoResult<Option<Definition>> {
        Ok(None)
    }

    fn list_by_score(&self, _query: &DefinitionListQuery) -> RepoResult<Vec<Definition>> {
        Ok(Vec::new())
    }
}

fn actor(id: &str) -> Actor {
    Actor::new(ActorId::parse(id).unwrap())
}

fn seed(aggregator: &InMemoryScoreAggregator, word: Uuid, text: &str) -> DefinitionId {
    aggregator
        .insert_definition(&NewDefinition::new(word, "author-1", text, "used in a sentence"))
        .unwrap()
}

#[test]
fn in_memory_pair_follows_two_actor_scenario() {
    let ledger = InMemoryVoteLedger::new();
    let aggregator = InMemoryScoreAggregator::new();
    let id = seed(&aggregator, Uuid::new_v4(), "lit");
    let service = VoteService::new(&ledger, &aggregator);

    service.cast_vote(Some(&actor("u1")), id, VoteValue::Up).unwrap();
    service.cast_vote(Some(&actor("u2")), id, VoteValue::Down).unwrap();
    service.cast_vote(Some(&actor("u1")), id, VoteValue::Down).unwrap();

    assert_eq!(service.tally(id).unwrap(), Tally::from_counts(0, 2));
    assert_eq!(ledger.len(), 2);
}

#[test]
fn counter_failure_after_ledger_write_reports_divergence() {
    let ledger = InMemoryVoteLedger::new();
    let service = VoteService::new(&ledger, UnavailableAggregator);
    let id = Uuid::new_v4();
    let u1 = actor("u1");

    let err = service.cast_vote(Some(&u1), id, VoteValue::Up).unwrap_err();

    match &err {
        VoteError::PartialWriteDivergence {
            definition_id,
            applied,
            ..
        } => {
            assert_eq!(*definition_id, id);
            assert_eq!(applied.resulting_vote(), Some(VoteValue::Up));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.source().is_some());
    // Ledger write is not rolled back.
    assert_eq!(ledger.current_vote(&u1.id, id).unwrap(), Some(VoteValue::Up));
}

#[test]
fn missing_definition_maps_to_item_not_found() {
    let ledger = InMemoryVoteLedger::new();
    let aggregator = InMemoryScoreAggregator::new();
    let service = VoteService::new(&ledger, &aggregator);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.cast_vote(Some(&actor("u1")), missing, VoteValue::Down),
        Err(VoteError::ItemNotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.tally(missing),
        Err(VoteError::ItemNotFound(_))
    ));
}

#[test]
fn anonymous_cast_touches_nothing() {
    let ledger = InMemoryVoteLedger::new();
    let aggregator = InMemoryScoreAggregator::new();
    let id = seed(&aggregator, Uuid::new_v4(), "salty");
    let service = VoteService::new(&ledger, &aggregator);

    let err = service.cast_vote(None, id, VoteValue::Up).unwrap_err();

    assert!(matches!(err, VoteError::AuthRequired));
    assert_eq!(err.to_string(), "you must be logged in to vote");
    assert!(ledger.is_empty());
    assert_eq!(service.tally(id).unwrap(), Tally::ZERO);
}

#[test]
fn lists_order_by_score_with_insertion_tie_break() {
    let ledger = InMemoryVoteLedger::new();
    let aggregator = InMemoryScoreAggregator::new();
    let word = Uuid::new_v4();
    let first = seed(&aggregator, word, "first");
    let second = seed(&aggregator, word, "second");
    let third = seed(&aggregator, word, "third");
    let elsewhere = seed(&aggregator, Uuid::new_v4(), "other word");
    let service = VoteService::new(&ledger, &aggregator);

    service.cast_vote(Some(&actor("u1")), third, VoteValue::Up).unwrap();
    service.cast_vote(Some(&actor("u1")), first, VoteValue::Down).unwrap();

    let ordered: Vec<DefinitionId> = service
        .list_by_score(&DefinitionListQuery::for_word(word))
        .unwrap()
        .into_iter()
        .map(|definition| definition.id)
        .collect();
    assert_eq!(ordered, vec![third, second, first]);

    let popular = service
        .list_by_score(&DefinitionListQuery {
            limit: Some(2),
            offset: 1,
            ..DefinitionListQuery::default()
        })
        .unwrap();
    let popular: Vec<DefinitionId> = popular.into_iter().map(|definition| definition.id).collect();
    assert_eq!(popular, vec![second, elsewhere]);
}

#[test]
fn concurrent_casts_from_distinct_actors_are_all_counted() {
    let ledger = InMemoryVoteLedger::new();
    let aggregator = InMemoryScoreAggregator::new();
    let id = seed(&aggregator, Uuid::new_v4(), "vibe");
    let service = VoteService::new(&ledger, &aggregator);

    std::thread::scope(|scope| {
        for worker in 0..16 {
            let service = &service;
            scope.spawn(move || {
                let value = if worker < 10 {
                    VoteValue::Up
                } else {
                    VoteValue::Down
                };
                service
                    .cast_vote(Some(&actor(&format!("w{worker}"))), id, value)
                    .unwrap();
            });
        }
    });

    assert_eq!(service.tally(id).unwrap(), Tally::from_counts(10, 6));
    assert_eq!(ledger.len(), 16);
}

#[test]
fn client_reconciles_lookup_optimistic_cast_and_reload() {
    let ledger = InMemoryVoteLedger::new();
    let aggregator = InMemoryScoreAggregator::new();
    let word = Uuid::new_v4();
    let a = seed(&aggregator, word, "a");
    let b = seed(&aggregator, word, "b");
    let service = VoteService::new(&ledger, &aggregator);
    let me = actor("me");
    service.cast_vote(Some(&actor("u9")), a, VoteValue::Up).unwrap();
    service.cast_vote(Some(&me), a, VoteValue::Up).unwrap();

    let mut client = ClientReconciler::new(true);
    let listed = service
        .list_by_score(&DefinitionListQuery::for_word(word))
        .unwrap();
    client.load_authoritative(listed);
    let votes = service.lookup_votes(&me.id, &client.order()).unwrap();
    client.apply_vote_lookup(&votes);

    assert_eq!(client.order(), vec![a, b]);
    assert_eq!(client.user_vote(a), Some(UserVote::Voted(VoteValue::Up)));
    assert_eq!(client.user_vote(b), Some(UserVote::NoVote));
    assert!(!client.controls(a).unwrap().up_enabled);

    // Switching my vote on `a` ties it with `b`; the previous order keeps `a` first.
    let update = client.apply_optimistic(a, VoteValue::Down).unwrap().unwrap();
    assert_eq!(update.tally, Tally::from_counts(1, 1));
    service.cast_vote(Some(&me), a, VoteValue::Down).unwrap();

    let update = client.apply_optimistic(b, VoteValue::Up).unwrap().unwrap();
    assert!(update.reordered());
    assert_eq!(client.order(), vec![b, a]);
    service.cast_vote(Some(&me), b, VoteValue::Up).unwrap();

    // Another actor votes meanwhile; the reload wins over the projected counters.
    service.cast_vote(Some(&actor("u7")), a, VoteValue::Up).unwrap();
    service.cast_vote(Some(&actor("u8")), a, VoteValue::Up).unwrap();
    client.load_authoritative(
        service
            .list_by_score(&DefinitionListQuery::for_word(word))
            .unwrap(),
    );
    assert_eq!(client.order(), vec![a, b]);
    assert_eq!(client.get(a).unwrap().definition.tally, Tally::from_counts(3, 1));
    assert_eq!(client.user_vote(a), Some(UserVote::Voted(VoteValue::Down)));
    assert_eq!(client.user_vote(b), Some(UserVote::Voted(VoteValue::Up)));

    let mut signed_out = ClientReconciler::new(false);
    signed_out.load_authoritative(
        service
            .list_by_score(&DefinitionListQuery::for_word(word))
            .unwrap(),
    );
    assert!(signed_out.apply_optimistic(b, VoteValue::Up).is_err());
    assert_eq!(signed_out.order(), vec![a, b]);
    assert_eq!(signed_out.user_vote(b), Some(UserVote::Unknown));
}

#[test]
fn wire_shape_uses_signed_votes_and_flat_counters() {
    let aggregator = InMemoryScoreAggregator::new();
    let id = seed(&aggregator, Uuid::new_v4(), "drip");
    let definition = aggregator.get_definition(id).unwrap().unwrap();

    let json = serde_json::to_value(&definition).unwrap();
    assert_eq!(json["upvotes"], 0);
    assert_eq!(json["score"], 0);
    assert_eq!(json["author_name"], "Anonymous");

    assert_eq!(serde_json::to_string(&VoteValue::Down).unwrap(), "-1");
    assert_eq!(serde_json::from_str::<VoteValue>("1").unwrap(), VoteValue::Up);
    assert!(serde_json::from_str::<VoteValue>("0").is_err());
}

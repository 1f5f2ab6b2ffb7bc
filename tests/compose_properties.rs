// tests/compose_properties.rs

use std::sync::Arc;

use proptest::prelude::*;
use taskdeck::errors::TaskdeckError;
use taskdeck::exec::{ExecutionUnit, ProcessSpec};
use taskdeck::plan::Composer;
use taskdeck::registry::{Target, TaskRegistry};
use taskdeck::types::TaskRef;

/// Task `task_i` gets `target_counts[i]` targets.
fn registry(target_counts: &[usize]) -> Arc<TaskRegistry> {
    let unit = ExecutionUnit::Process(ProcessSpec::new("true"));
    let mut reg = TaskRegistry::new();
    for (i, count) in target_counts.iter().enumerate() {
        let name = format!("task_{i}");
        let targets = (0..*count)
            .map(|t| Target::new(name.clone(), format!("t{t}"), unit.clone()))
            .collect();
        reg.register(name, targets).unwrap();
    }
    Arc::new(reg)
}

/// One alias member before it is turned into a reference.
#[derive(Debug, Clone)]
enum Member {
    Task(usize),
    TaskTarget(usize, usize),
    /// Raw index; sanitized so alias `i` only references aliases `< i`.
    Alias(usize),
}

fn member_strategy() -> impl Strategy<Value = Member> {
    prop_oneof![
        any::<usize>().prop_map(Member::Task),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Member::TaskTarget(a, b)),
        any::<usize>().prop_map(Member::Alias),
    ]
}

struct Fixture {
    composer: Composer,
    /// Expected expansion length per alias.
    expected: Vec<usize>,
}

fn build(target_counts: Vec<usize>, raw_aliases: Vec<Vec<Member>>) -> Fixture {
    let reg = registry(&target_counts);
    let mut composer = Composer::new(Arc::clone(&reg));
    let mut expected: Vec<usize> = Vec::new();

    for (i, members) in raw_aliases.into_iter().enumerate() {
        let mut refs = Vec::new();
        let mut len = 0;
        for member in members {
            let (raw, size) = match member {
                Member::Task(t) => {
                    let t = t % target_counts.len();
                    (format!("task_{t}"), target_counts[t])
                }
                Member::TaskTarget(t, target) => {
                    let t = t % target_counts.len();
                    let target = target % target_counts[t];
                    (format!("task_{t}:t{target}"), 1)
                }
                Member::Alias(a) if i > 0 => {
                    let a = a % i;
                    (format!("alias_{a}"), expected[a])
                }
                Member::Alias(_) => ("task_0".to_string(), target_counts[0]),
            };
            refs.push(TaskRef::parse(&raw).unwrap());
            len += size;
        }
        composer.define_alias(format!("alias_{i}"), refs).unwrap();
        expected.push(len);
    }

    Fixture { composer, expected }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn acyclic_expansion_length_is_sum_of_components(
        target_counts in proptest::collection::vec(1usize..4, 1..6),
        raw_aliases in proptest::collection::vec(
            proptest::collection::vec(member_strategy(), 0..5),
            1..8,
        ),
    ) {
        let fixture = build(target_counts, raw_aliases);
        for (i, expected) in fixture.expected.iter().enumerate() {
            let plan = fixture.composer.expand(&format!("alias_{i}")).unwrap();
            prop_assert_eq!(plan.len(), *expected);
        }
    }

    #[test]
    fn alias_expansion_is_concatenation_of_members(
        target_counts in proptest::collection::vec(1usize..4, 1..6),
        raw_aliases in proptest::collection::vec(
            proptest::collection::vec(member_strategy(), 1..5),
            1..8,
        ),
    ) {
        let fixture = build(target_counts, raw_aliases);
        for (name, members) in fixture.composer.aliases().iter() {
            let mut concatenated = Vec::new();
            for member in members {
                concatenated.extend(fixture.composer.expand_ref(member).unwrap());
            }
            prop_assert_eq!(fixture.composer.expand(name).unwrap(), concatenated);
        }
    }

    #[test]
    fn reachable_cycle_is_reported_not_looped(
        chain_len in 1usize..6,
        prefix_tasks in 0usize..3,
    ) {
        let reg = registry(&[1]);
        let mut composer = Composer::new(reg);

        // alias_0 -> alias_1 -> ... -> alias_{n-1} -> alias_0
        for i in 0..chain_len {
            let mut refs: Vec<TaskRef> = (0..prefix_tasks)
                .map(|_| TaskRef::parse("task_0").unwrap())
                .collect();
            refs.push(TaskRef::parse(&format!("alias_{}", (i + 1) % chain_len)).unwrap());
            composer.define_alias(format!("alias_{i}"), refs).unwrap();
        }

        // Entering through an outside alias still reports the loop itself.
        composer
            .define_alias("entry", vec![TaskRef::parse("alias_0").unwrap()])
            .unwrap();

        match composer.expand("entry") {
            Err(TaskdeckError::CyclicAlias(path)) => {
                let names: Vec<&str> = path.split(" -> ").collect();
                prop_assert_eq!(names.len(), chain_len + 1);
                prop_assert_eq!(names.first(), names.last());
                prop_assert_eq!(names[0], "alias_0");
            }
            other => prop_assert!(false, "expected CyclicAlias, got {:?}", other),
        }
    }
}

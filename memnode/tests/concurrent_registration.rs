#![cfg(feature = "memory-input")]

use futures::future::join_all;
use memnode::*;
use rand::seq::SliceRandom;

const ROUNDS: usize = 200;
const NAMES: usize = 8;

#[derive(Clone, Copy, Debug)]
enum Role {
    Writer(usize),
    Reader(usize),
}

fn build(ctx: &BuildContext, role: Role) -> Box<dyn Node> {
    let factory = NodeFactory::with_builtin(&ctx.config);
    let layer = match role {
        Role::Writer(i) => LayerDesc::memory_output(&format!("w{i}"), &format!("s{i}")),
        Role::Reader(i) => LayerDesc::memory_input(
            &format!("r{i}"),
            &format!("s{i}"),
            MemoryDesc::new(vec![4], Precision::F32),
        ),
    };
    factory.create(&layer, ctx).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pairing_resolves_every_name_once() {
    for _ in 0..ROUNDS {
        let ctx = BuildContext::default();
        let mut roles: Vec<Role> = (0..NAMES)
            .flat_map(|i| [Role::Writer(i), Role::Reader(i)])
            .collect();
        roles.shuffle(&mut rand::thread_rng());

        let tasks = roles.into_iter().map(|role| {
            let ctx = ctx.clone();
            tokio::task::spawn_blocking(move || build(&ctx, role))
        });
        let nodes: Vec<Box<dyn Node>> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(ctx.registry.pending_count(), 0);
        for i in 0..NAMES {
            let memory_id = format!("s{i}");
            let writer = nodes
                .iter()
                .find(|n| n.kind() == NodeKind::MemoryOutput && n.memory_id() == Some(memory_id.as_str()))
                .unwrap();
            let reader = nodes
                .iter()
                .find(|n| n.kind() == NodeKind::MemoryInput && n.memory_id() == Some(memory_id.as_str()))
                .unwrap();

            assert_eq!(writer.downstream_redirect(), Some(reader.handle()));
            assert_eq!(
                ctx.registry.resolved_pair(&memory_id),
                Some((writer.handle(), reader.handle()))
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_writers_admit_exactly_one() {
    for _ in 0..ROUNDS {
        let ctx = BuildContext::default();
        let tasks = (0..4).map(|_| {
            let ctx = ctx.clone();
            tokio::task::spawn_blocking(move || {
                NodeFactory::with_builtin(&ctx.config)
                    .create(&LayerDesc::memory_output("w", "s0"), &ctx)
            })
        });
        // Admitted writers stay alive until every claim has been made
        let results: Vec<Result<Box<dyn Node>>> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(
                err,
                &MemNodeError::DuplicateRole {
                    memory_id: "s0".into(),
                    role: NodeKind::MemoryOutput
                }
            );
        }
        assert!(ctx.registry.is_pending("s0"));

        drop(results);
        assert!(!ctx.registry.is_pending("s0"));
    }
}

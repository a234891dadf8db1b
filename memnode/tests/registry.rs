use memnode::nodes::MemoryOutputNode;
#[cfg(feature = "memory-input")]
use memnode::nodes::MemoryInputNode;
use memnode::*;

#[cfg(feature = "memory-input")]
fn state_desc() -> MemoryDesc {
    MemoryDesc::new(vec![3], Precision::F32)
}

fn writer(ctx: &BuildContext, name: &str, memory_id: &str) -> Result<MemoryOutputNode> {
    MemoryOutputNode::new(&LayerDesc::memory_output(name, memory_id), ctx)
}

#[cfg(feature = "memory-input")]
fn reader(ctx: &BuildContext, name: &str, memory_id: &str) -> Result<MemoryInputNode> {
    MemoryInputNode::new(&LayerDesc::memory_input(name, memory_id, state_desc()), ctx)
}

// --------------------------------------------------------------------
// Pairing
//

#[test]
#[cfg(feature = "memory-input")]
fn test_writer_first_pairs_when_reader_arrives() {
    let ctx = BuildContext::default();
    let w = writer(&ctx, "w", "s0").unwrap();
    assert!(!w.is_paired());
    assert!(ctx.registry.is_pending("s0"));

    let r = reader(&ctx, "r", "s0").unwrap();
    assert!(w.is_paired());
    assert_eq!(w.downstream_redirect(), Some(r.handle()));
    assert_eq!(ctx.registry.pending_count(), 0);
    assert_eq!(
        ctx.registry.resolved_pair("s0"),
        Some((w.handle(), r.handle()))
    );
}

#[test]
#[cfg(feature = "memory-input")]
fn test_reader_first_pairs_when_writer_arrives() {
    let ctx = BuildContext::default();
    let r = reader(&ctx, "r", "s0").unwrap();
    assert!(ctx.registry.is_pending("s0"));

    let w = writer(&ctx, "w", "s0").unwrap();
    assert!(w.is_paired());
    assert_eq!(w.pairing().map(Pairing::reader), Some(r.handle()));
    assert_eq!(ctx.registry.pending_count(), 0);
}

#[test]
#[cfg(feature = "memory-input")]
fn test_independent_names_do_not_interfere() {
    let ctx = BuildContext::default();
    let w0 = writer(&ctx, "w0", "s0").unwrap();
    let r1 = reader(&ctx, "r1", "s1").unwrap();
    assert_eq!(ctx.registry.pending_count(), 2);

    let r0 = reader(&ctx, "r0", "s0").unwrap();
    let w1 = writer(&ctx, "w1", "s1").unwrap();
    assert_eq!(w0.downstream_redirect(), Some(r0.handle()));
    assert_eq!(w1.downstream_redirect(), Some(r1.handle()));
    assert_eq!(ctx.registry.pending_count(), 0);
}

#[test]
#[cfg(feature = "memory-input")]
fn test_separate_contexts_do_not_share_names() {
    let ctx_a = BuildContext::default();
    let ctx_b = BuildContext::default();
    let w = writer(&ctx_a, "w", "s0").unwrap();
    let _r = reader(&ctx_b, "r", "s0").unwrap();

    assert!(!w.is_paired());
    assert!(ctx_a.registry.is_pending("s0"));
    assert!(ctx_b.registry.is_pending("s0"));
}

// --------------------------------------------------------------------
// Rejected claims
//

#[test]
fn test_second_pending_writer_is_rejected() {
    let ctx = BuildContext::default();
    let _w = writer(&ctx, "w", "s0").unwrap();
    let err = writer(&ctx, "w2", "s0").unwrap_err();
    assert_eq!(
        err,
        MemNodeError::DuplicateRole {
            memory_id: "s0".into(),
            role: NodeKind::MemoryOutput
        }
    );
    assert!(err.is_configuration());
    assert_eq!(err.memory_id(), Some("s0"));
}

#[test]
#[cfg(feature = "memory-input")]
fn test_second_pending_reader_is_rejected() {
    let ctx = BuildContext::default();
    let _r = reader(&ctx, "r", "s0").unwrap();
    let err = reader(&ctx, "r2", "s0").unwrap_err();
    assert_eq!(
        err,
        MemNodeError::DuplicateRole {
            memory_id: "s0".into(),
            role: NodeKind::MemoryInput
        }
    );
}

#[test]
#[cfg(feature = "memory-input")]
fn test_third_claimant_is_rejected() {
    let ctx = BuildContext::default();
    let _w = writer(&ctx, "w", "s0").unwrap();
    let _r = reader(&ctx, "r", "s0").unwrap();

    let err = writer(&ctx, "w2", "s0").unwrap_err();
    assert_eq!(
        err,
        MemNodeError::MemoryIdOverclaimed {
            memory_id: "s0".into()
        }
    );
    let err = reader(&ctx, "r2", "s0").unwrap_err();
    assert_eq!(
        err,
        MemNodeError::MemoryIdOverclaimed {
            memory_id: "s0".into()
        }
    );
}

#[test]
fn test_empty_memory_id_is_rejected() {
    let ctx = BuildContext::default();
    let err = writer(&ctx, "w", "").unwrap_err();
    assert_eq!(err, MemNodeError::EmptyMemoryId { node: "w".into() });
    assert_eq!(ctx.registry.pending_count(), 0);
}

#[test]
#[cfg(feature = "memory-input")]
fn test_empty_reader_memory_id_is_rejected() {
    let ctx = BuildContext::default();
    let layer = LayerDesc::new("MemoryInput", "r").with_output(state_desc());
    let err = MemoryInputNode::new(&layer, &ctx).unwrap_err();
    assert_eq!(err, MemNodeError::EmptyMemoryId { node: "r".into() });
    assert_eq!(ctx.registry.pending_count(), 0);
}

#[test]
#[cfg(feature = "memory-input")]
fn test_reader_without_descriptor_is_rejected() {
    let ctx = BuildContext::default();
    let layer = LayerDesc::new("MemoryInput", "r").with_memory_id("s0");
    let err = MemoryInputNode::new(&layer, &ctx).unwrap_err();
    assert_eq!(err, MemNodeError::MissingDescriptor { node: "r".into() });
    assert!(!ctx.registry.is_pending("s0"));
}

// --------------------------------------------------------------------
// Destruction
//

#[test]
#[cfg(feature = "memory-input")]
fn test_dropped_pending_writer_frees_the_name() {
    let ctx = BuildContext::default();
    let w = writer(&ctx, "w", "s0").unwrap();
    drop(w);
    assert!(!ctx.registry.is_pending("s0"));

    // A fresh writer can claim the name again
    let w2 = writer(&ctx, "w2", "s0").unwrap();
    let r = reader(&ctx, "r", "s0").unwrap();
    assert_eq!(w2.downstream_redirect(), Some(r.handle()));
}

#[test]
#[cfg(feature = "memory-input")]
fn test_dropped_pending_reader_frees_the_name() {
    let ctx = BuildContext::default();
    let r = reader(&ctx, "r", "s0").unwrap();
    drop(r);
    assert_eq!(ctx.registry.pending_count(), 0);

    // The writer must not pair with the destroyed reader
    let w = writer(&ctx, "w", "s0").unwrap();
    assert!(!w.is_paired());
}

#[test]
#[cfg(feature = "memory-input")]
fn test_drop_after_pairing_keeps_the_record() {
    let ctx = BuildContext::default();
    let w = writer(&ctx, "w", "s0").unwrap();
    let r = reader(&ctx, "r", "s0").unwrap();
    let pair = (w.handle(), r.handle());

    drop(w);
    drop(r);
    assert_eq!(ctx.registry.resolved_pair("s0"), Some(pair));
    assert_eq!(ctx.registry.pending_count(), 0);
}

#[test]
fn test_dropping_one_node_leaves_other_pending_entries() {
    let ctx = BuildContext::default();
    let w0 = writer(&ctx, "w0", "s0").unwrap();
    let _w1 = writer(&ctx, "w1", "s1").unwrap();

    drop(w0);
    assert!(!ctx.registry.is_pending("s0"));
    assert!(ctx.registry.is_pending("s1"));
}

// --------------------------------------------------------------------
// Deployments without the reader role
//

fn without_readers() -> BuildContext {
    BuildContext::new(EngineConfig {
        memory_input_supported: false,
        ..EngineConfig::default()
    })
}

#[test]
fn test_readers_unsupported() {
    let ctx = without_readers();
    let factory = NodeFactory::with_builtin(&ctx.config);
    let layer = LayerDesc::memory_input("r", "s0", MemoryDesc::new(vec![3], Precision::F32));

    let err = factory.create(&layer, &ctx).err().unwrap();
    assert_eq!(
        err,
        MemNodeError::MemoryInputUnsupported {
            memory_id: "s0".into()
        }
    );
    assert!(err.is_configuration());

    // Writers still build, they simply never pair
    let w = writer(&ctx, "w", "s0").unwrap();
    assert!(!w.is_paired());
    assert_eq!(
        w.validate(),
        Err(MemNodeError::Unpaired {
            memory_id: "s0".into()
        })
    );
}

#[test]
fn test_second_writer_without_readers_is_a_duplicate() {
    let ctx = without_readers();
    let _w = writer(&ctx, "w", "s0").unwrap();

    let err = writer(&ctx, "w2", "s0").unwrap_err();
    assert_eq!(
        err,
        MemNodeError::DuplicateRole {
            memory_id: "s0".into(),
            role: NodeKind::MemoryOutput
        }
    );
}

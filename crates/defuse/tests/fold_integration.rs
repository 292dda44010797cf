//! End-to-end folding over a raw image: lift, fold, re-lift, until
//! the work queue drains.

use defuse::{Driver, DriverStats};
use defuse_asm::{RAX, X86Encoder};
use defuse_image::{NOP, RawImage};
use defuse_ir::{
    Addr, Expr, FunctionBuilder, InstrKind, IrFunction, IrLevel, SsaReg, Value,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal transfer-only front end: decodes short and near jumps plus
/// no-op runs, and treats everything else as opaque work.
fn lift_transfers(layout: &[Addr], image: &RawImage) -> IrFunction {
    #[derive(Clone, Copy)]
    enum Decoded {
        Nop,
        Jump(Addr),
        Work,
    }

    let decoded: Vec<(Addr, Decoded)> = layout
        .iter()
        .map(|&addr| {
            let bytes = image.instr_bytes(addr).unwrap();
            let d = if bytes.iter().all(|&b| b == NOP) {
                Decoded::Nop
            } else if bytes[0] == 0xEB {
                let rel = i64::from(i8::from_le_bytes([bytes[1]]));
                Decoded::Jump(addr.wrapping_add(2).wrapping_add_signed(rel))
            } else if bytes[0] == 0xE9 {
                let rel = i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
                Decoded::Jump(addr.wrapping_add(5).wrapping_add_signed(i64::from(rel)))
            } else {
                Decoded::Work
            };
            (addr, d)
        })
        .collect();
    let index_of = |a: Addr| decoded.iter().position(|&(x, _)| x == a).unwrap();

    let mut b = FunctionBuilder::new();
    for &(addr, d) in &decoded {
        let kind = match d {
            Decoded::Nop => InstrKind::Nop,
            Decoded::Jump(t) => InstrKind::Goto {
                target: index_of(t),
            },
            Decoded::Work => InstrKind::Push {
                src: Expr::Const(0),
            },
        };
        let r = b.reg_instr(addr, kind.clone());
        let v = b.var_instr(addr, kind);
        b.link(v, r);
    }
    b.build()
}

#[test]
fn test_goto_chain_converges_to_fixed_point() {
    init_logging();
    // 0x1000: jmp 0x1010 (near)
    // 0x1010: jmp 0x1020 (short)
    // 0x1020: push rax
    let mut data = vec![0xCC; 0x30];
    data[..5].copy_from_slice(&[0xE9, 0x0B, 0x00, 0x00, 0x00]);
    data[0x10..0x12].copy_from_slice(&[0xEB, 0x0E]);
    data[0x20] = 0x50;
    let mut img = RawImage::new(0x1000, data);
    img.mark_instr(0x1000, 5);
    img.mark_instr(0x1010, 2);
    img.mark_instr(0x1020, 1);

    let layout = [0x1000, 0x1010, 0x1020];
    let lifter = move |image: &RawImage| lift_transfers(&layout, image);
    let mut driver = Driver::new(lifter, X86Encoder::new());

    driver.seed([0x1000]);
    let stats = driver.run(&mut img).unwrap();
    assert_eq!(
        stats,
        DriverStats {
            folds: 1,
            resolves: 0,
            skipped: 1,
        }
    );
    // The entry jump now lands directly on the work instruction.
    assert_eq!(&img.bytes()[..5], &[0xEB, 0x1E, NOP, NOP, NOP]);
    // The skipped hop keeps its bytes.
    assert_eq!(&img.bytes()[0x10..0x12], &[0xEB, 0x0E]);

    // A second pass finds the chain already collapsed and changes
    // nothing.
    let before = img.bytes().to_vec();
    driver.seed([0x1000]);
    let stats = driver.run(&mut img).unwrap();
    assert_eq!(
        stats,
        DriverStats {
            folds: 0,
            resolves: 1,
            skipped: 0,
        }
    );
    assert_eq!(img.bytes(), &before[..]);
}

#[test]
fn test_register_chain_folds_over_image() {
    init_logging();
    // 0x1000: mov rax, 5
    // 0x1007: add rax, 0
    // 0x100b: push rax
    let mut data = vec![0xCC; 0x10];
    data[..7].copy_from_slice(&[0x48, 0xC7, 0xC0, 0x05, 0x00, 0x00, 0x00]);
    data[7..11].copy_from_slice(&[0x48, 0x83, 0xC0, 0x00]);
    data[11] = 0x50;
    let mut img = RawImage::new(0x1000, data);
    img.mark_instr(0x1000, 7);
    img.mark_instr(0x1007, 4);
    img.mark_instr(0x100b, 1);

    let lifter = |image: &RawImage| {
        let mut b = FunctionBuilder::new();
        let rax1 = SsaReg::new(RAX, 1);
        let rax2 = SsaReg::new(RAX, 2);
        let folded = image
            .instr_bytes(0x1007)
            .is_some_and(|bytes| bytes.iter().all(|&x| x == NOP));
        let (r0, r1, r2) = if folded {
            let r0 = b.reg_instr(
                0x1000,
                InstrKind::SetReg {
                    dest: RAX,
                    ssa_dest: Some(rax1),
                    src: Expr::Const(5),
                },
            );
            let r1 = b.reg_instr(0x1007, InstrKind::Nop);
            let r2 = b.reg_instr(
                0x100b,
                InstrKind::Push {
                    src: Expr::RegSsa(rax1),
                },
            );
            (r0, r1, r2)
        } else {
            let r0 = b.reg_instr(
                0x1000,
                InstrKind::SetReg {
                    dest: RAX,
                    ssa_dest: Some(rax1),
                    src: Expr::Const(5),
                },
            );
            let r1 = b.reg_instr(
                0x1007,
                InstrKind::SetReg {
                    dest: RAX,
                    ssa_dest: Some(rax2),
                    src: Expr::add(Expr::RegSsa(rax1), Expr::Const(0)),
                },
            );
            let r2 = b.reg_instr(
                0x100b,
                InstrKind::Push {
                    src: Expr::RegSsa(rax2),
                },
            );
            b.value(IrLevel::Register, r2, Value::Constant(5));
            (r0, r1, r2)
        };
        // Variable-level view: the value use is opaque here, driving
        // the fold down to the register level.
        let v0 = b.var_instr(0x1000, InstrKind::Nop);
        let v1 = b.var_instr(0x1007, InstrKind::Nop);
        let v2 = b.var_instr(
            0x100b,
            InstrKind::Push {
                src: Expr::Const(0),
            },
        );
        b.link(v0, r0);
        b.link(v1, r1);
        b.link(v2, r2);
        b.build()
    };

    let mut driver = Driver::new(lifter, X86Encoder::new());
    driver.seed([0x100b]);
    let stats = driver.run(&mut img).unwrap();
    assert_eq!(
        stats,
        DriverStats {
            folds: 1,
            resolves: 0,
            skipped: 1,
        }
    );
    // Oldest definition rewritten, dependent definition neutralized,
    // use site untouched.
    assert_eq!(&img.bytes()[..7], &[0xB8, 0x05, 0x00, 0x00, 0x00, NOP, NOP]);
    assert_eq!(&img.bytes()[7..11], &[NOP; 4]);
    assert_eq!(img.bytes()[11], 0x50);
}

#[test]
fn test_indirect_jump_waits_for_phase() {
    init_logging();
    // 0x1000: jmp [rip+disp] through a pointer the analysis proves
    //         constant
    // 0x100a: push rax
    let mut data = vec![0xCC; 0x10];
    data[..6].copy_from_slice(&[0xFF, 0x25, 0x00, 0x20, 0x00, 0x00]);
    data[0x0a] = 0x50;
    let mut img = RawImage::new(0x1000, data);
    img.mark_instr(0x1000, 6);
    img.mark_instr(0x100a, 1);

    let lifter = |image: &RawImage| {
        let mut b = FunctionBuilder::new();
        let indirect = image
            .instr_bytes(0x1000)
            .is_some_and(|bytes| bytes[0] == 0xFF);
        let (r0, v0) = if indirect {
            let dest = Expr::load(Expr::Const(0x3000), 8);
            let r0 = b.reg_instr(0x1000, InstrKind::JumpIndirect { dest: dest.clone() });
            b.value(IrLevel::Register, r0, Value::ConstPtr(0x100a));
            let v0 = b.var_instr(0x1000, InstrKind::JumpIndirect { dest });
            (r0, v0)
        } else {
            let r0 = b.reg_instr(0x1000, InstrKind::Goto { target: 1 });
            let v0 = b.var_instr(0x1000, InstrKind::Goto { target: 1 });
            (r0, v0)
        };
        let r1 = b.reg_instr(
            0x100a,
            InstrKind::Push {
                src: Expr::Const(0),
            },
        );
        let v1 = b.var_instr(
            0x100a,
            InstrKind::Push {
                src: Expr::Const(0),
            },
        );
        b.link(v0, r0);
        b.link(v1, r1);
        b.build()
    };

    let mut driver = Driver::new(lifter, X86Encoder::new());

    // Before the indirect fold phase the jump is left alone.
    driver.seed([0x1000]);
    let stats = driver.run(&mut img).unwrap();
    assert_eq!(stats.folds, 0);
    assert_eq!(stats.skipped, 1);
    assert_eq!(img.bytes()[0], 0xFF);

    driver.advance_phase();
    driver.advance_phase();
    driver.advance_phase();
    assert_eq!(driver.phase(), 3);

    driver.seed([0x1000]);
    let stats = driver.run(&mut img).unwrap();
    assert_eq!(
        stats,
        DriverStats {
            folds: 1,
            resolves: 0,
            skipped: 1,
        }
    );
    assert_eq!(&img.bytes()[..6], &[0xEB, 0x08, NOP, NOP, NOP, NOP]);
    assert_eq!(img.bytes()[0x0a], 0x50);
}

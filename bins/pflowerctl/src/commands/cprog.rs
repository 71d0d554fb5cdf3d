//! `pflowerctl cprog`: lower the filter to a cprog and drive it through
//! emission, the toolchain, and the kernel load/attach bridge (spec.md
//! §6's `make_cprog`/`cprog_to_buf`/`cprog_to_file`/`dump_cprog`,
//! `compile_c_to_bytecode`, `load`/`attach`/`fill_table`).

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};

use pflower::cprog::{buf, make_cprog, OptionOverrides, Target};
use pflower::{kernel, toolchain};

use super::open_filter;

#[derive(Args)]
pub struct CprogCmd {
    #[command(subcommand)]
    action: CprogAction,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum TargetArg {
    IngressExpress,
    IngressClassifier,
}

impl From<TargetArg> for Target {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::IngressExpress => Target::IngressExpress,
            TargetArg::IngressClassifier => Target::IngressClassifier,
        }
    }
}

/// Emission options shared by every subcommand that builds a cprog
/// (teacher precedent: one `clap::Args` group per subcommand, folded
/// here since every cprog subcommand needs the same knobs).
#[derive(Args, Clone)]
struct CprogOpts {
    /// Attachment target the emitted program is written for.
    #[arg(long, value_enum, default_value = "ingress-express")]
    target: TargetArg,

    /// SPDX-ish license string embedded in the generated source.
    #[arg(long)]
    license: Option<String>,

    /// Emit a straight-line conjunction per rule instead of a table loop.
    #[arg(long)]
    inline_match: bool,

    /// Unroll the lookup loop to a fixed iteration count.
    #[arg(long)]
    no_loops: bool,

    /// Skip VLAN tag decoding even if a rule references a VLAN match.
    #[arg(long)]
    no_vlan: bool,

    /// Emit a `bpf_printk` call on the default-verdict fallthrough.
    #[arg(long)]
    debug_print: bool,
}

impl From<CprogOpts> for OptionOverrides {
    fn from(value: CprogOpts) -> Self {
        OptionOverrides {
            inline_match: value.inline_match,
            no_loops: value.no_loops,
            no_vlan: value.no_vlan,
            debug_print: value.debug_print,
            cloned_filter: false,
            license: value.license,
        }
    }
}

#[derive(Subcommand)]
enum CprogAction {
    /// Print the cprog's resolved options (target, needs, helpers).
    Dump {
        #[command(flatten)]
        opts: CprogOpts,
    },

    /// Emit the generated C source to a file (or stdout if `--out` is omitted).
    Emit {
        #[command(flatten)]
        opts: CprogOpts,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Compile a previously emitted `.c` file to a verifier-compatible object.
    Compile {
        c_path: PathBuf,

        #[arg(long)]
        obj_path: Option<PathBuf>,

        #[arg(long)]
        ir_path: Option<PathBuf>,

        #[arg(long)]
        compiler_path: Option<PathBuf>,

        #[arg(long)]
        assembler_path: Option<PathBuf>,
    },

    /// Load a compiled object into the kernel without attaching it.
    Load {
        obj_path: PathBuf,

        #[command(flatten)]
        opts: CprogOpts,

        #[arg(long, default_value_t = 0)]
        ifindex: u32,
    },

    /// Load a compiled object and attach it to an interface's ingress hook,
    /// then populate its runtime table (spec.md §6's `attach` followed by
    /// `fill_table`; a CLI invocation can't hold a kernel handle open
    /// across processes, so attach and fill happen in the same command).
    Attach {
        obj_path: PathBuf,

        #[command(flatten)]
        opts: CprogOpts,

        #[arg(long)]
        ifindex: u32,

        #[arg(long, default_value_t = 0)]
        log_level: u32,

        #[arg(long, default_value_t = 0)]
        flags: u32,
    },
}

impl CprogCmd {
    pub fn run(self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let filter = open_filter(path)?;

        match self.action {
            CprogAction::Dump { opts } => {
                let cprog = make_cprog(&filter, opts.target.into(), opts.clone().into())?;
                println!("{}", buf::dump_cprog(&cprog));
                Ok(())
            }
            CprogAction::Emit { opts, out } => {
                let cprog = make_cprog(&filter, opts.target.into(), opts.into())?;
                match out {
                    Some(path) => buf::cprog_to_file(&cprog, &path)?,
                    None => {
                        let mut bytes = Vec::new();
                        buf::cprog_to_buf(&cprog, &mut bytes)?;
                        bytes.pop(); // trailing NUL, not meaningful on stdout
                        print!("{}", String::from_utf8_lossy(&bytes));
                    }
                }
                Ok(())
            }
            CprogAction::Compile {
                c_path,
                obj_path,
                ir_path,
                compiler_path,
                assembler_path,
            } => {
                let paths = toolchain::ToolchainPaths {
                    obj_path,
                    ir_path,
                    compiler_path,
                    assembler_path,
                };
                let output = toolchain::compile_c_to_bytecode(&c_path, paths)?;
                println!("object: {}", output.obj_path.display());
                println!("ir: {}", output.ir_path.display());
                Ok(())
            }
            CprogAction::Load { obj_path, opts, ifindex } => {
                let cprog = make_cprog(&filter, opts.target.into(), opts.into())?;
                let attr = kernel::AttachAttr {
                    interface_index: ifindex,
                    ..Default::default()
                };
                let handle = kernel::load(&cprog, &obj_path, attr)?;
                println!("loaded (attached={})", handle.is_attached());
                Ok(())
            }
            CprogAction::Attach {
                obj_path,
                opts,
                ifindex,
                log_level,
                flags,
            } => {
                let cprog = make_cprog(&filter, opts.target.into(), opts.into())?;
                let attr = kernel::AttachAttr {
                    interface_index: ifindex,
                    log_level,
                    flags,
                };
                let handle = kernel::attach(&cprog, &obj_path, attr)?;
                let entries = kernel::fill_table(&cprog, &handle)?;
                println!("attached to ifindex {ifindex}, filled {entries} table entries");
                Ok(())
            }
        }
    }
}

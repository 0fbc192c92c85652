//! Block extraction and construction.
//!
//! Every top-level block of a parsed file is checked against the
//! configuration schema, then handed to a [`BlockBuilder`] which turns it into
//! a [`Block`] and may attach derived attributes.

use super::label_count;
use crate::error::{ErrorCollector, Result};
use crate::types::{Block, ParsedFile, RawBlock};

use hcl::{Map, Structure, Value};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where the blocks being built live.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Directory of the root module
    pub root_path: PathBuf,
    /// Directory of the module the blocks belong to
    pub module_dir: PathBuf,
}

impl BuildContext {
    /// Context for blocks of the root module.
    #[must_use]
    pub fn root(path: &Path) -> Self {
        Self {
            root_path: path.to_path_buf(),
            module_dir: path.to_path_buf(),
        }
    }
}

/// Turns raw parsed blocks into [`Block`]s.
#[cfg_attr(test, mockall::automock)]
pub trait BlockBuilder: Send + Sync {
    /// Build a block. `module_block` is the module call the block is loaded
    /// through, `None` in the root module.
    fn new_block<'a>(&self, raw: RawBlock, module_block: Option<&'a Block>, ctx: &BuildContext) -> Block;
}

/// A hook attaching derived attributes to a freshly built block.
pub type SetAttributesFn = fn(&mut Block, &BuildContext);

/// The standard block builder: copies the raw block and runs its hooks.
#[derive(Clone)]
pub struct DefaultBlockBuilder {
    set_attributes: Vec<SetAttributesFn>,
}

impl DefaultBlockBuilder {
    /// Create a builder running the given hooks in order.
    #[must_use]
    pub fn new(set_attributes: Vec<SetAttributesFn>) -> Self {
        Self { set_attributes }
    }
}

impl Default for DefaultBlockBuilder {
    fn default() -> Self {
        Self::new(vec![set_uuid_attributes])
    }
}

impl BlockBuilder for DefaultBlockBuilder {
    fn new_block<'a>(&self, raw: RawBlock, module_block: Option<&'a Block>, ctx: &BuildContext) -> Block {
        let module_path = module_block
            .map(|call| {
                let mut path = call.module_path.clone();
                path.extend(call.name().map(String::from));
                path
            })
            .unwrap_or_default();

        let mut block = Block {
            block_type: raw.block.identifier().to_string(),
            labels: raw.block.labels().iter().map(|l| l.as_str().to_string()).collect(),
            body: raw.block.body,
            filename: raw.filename,
            module_path,
            values: Map::new(),
        };

        for set_attributes in &self.set_attributes {
            set_attributes(&mut block, ctx);
        }

        block
    }
}

/// Attach a stable `uuid` to resource and data blocks.
///
/// The identifier is a UUID v5 over the block's file (relative to the root
/// module) and address, so parsing the same configuration twice yields the
/// same identifiers.
pub fn set_uuid_attributes(block: &mut Block, ctx: &BuildContext) {
    if block.block_type != "resource" && block.block_type != "data" {
        return;
    }

    let file = block
        .filename
        .strip_prefix(&ctx.root_path)
        .unwrap_or(&block.filename);
    let seed = format!("{}:{}", file.display(), block.address());
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes());

    block.values.insert("uuid".to_string(), Value::from(id.to_string()));
}

/// Extract the top-level blocks of a parsed file, validating them against
/// the configuration schema.
///
/// # Errors
///
/// Returns an `HclStructure` error if the file has top-level attributes,
/// unknown block types or blocks with the wrong number of labels.
pub fn extract_blocks(file: ParsedFile) -> Result<Vec<RawBlock>> {
    let ParsedFile { path, body, .. } = file;
    let mut blocks = Vec::new();

    for structure in body.into_inner() {
        match structure {
            Structure::Attribute(attr) => {
                return Err(crate::err!(HclStructure {
                    file: path,
                    message: format!("unexpected top-level attribute '{}'", attr.key()),
                }));
            }
            Structure::Block(block) => {
                let block_type = block.identifier().to_string();
                let Some(expected) = label_count(&block_type) else {
                    return Err(crate::err!(HclStructure {
                        file: path,
                        message: format!("unsupported block type '{block_type}'"),
                    }));
                };
                if block.labels().len() != expected {
                    return Err(crate::err!(HclStructure {
                        file: path,
                        message: format!(
                            "{block_type} block expects {expected} label(s), got {}",
                            block.labels().len()
                        ),
                    }));
                }
                blocks.push(RawBlock {
                    block,
                    filename: path.clone(),
                });
            }
        }
    }

    Ok(blocks)
}

/// Build the blocks of a set of parsed files, preserving file and source order.
///
/// A file whose blocks cannot be extracted is skipped with a warning and
/// recorded in `skipped`, unless `strict` is set.
///
/// # Errors
///
/// Returns the first extraction error when `strict` is set.
pub fn construct_blocks(
    files: Vec<ParsedFile>,
    builder: &dyn BlockBuilder,
    module_block: Option<&Block>,
    ctx: &BuildContext,
    strict: bool,
    skipped: &mut ErrorCollector,
) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();

    for file in files {
        let path = file.path.clone();
        let raw_blocks = match extract_blocks(file) {
            Ok(raw_blocks) => raw_blocks,
            Err(e) => {
                if strict {
                    return Err(e);
                }
                tracing::warn!(file = %path.display(), "skipping file could not load blocks err: {}", e);
                skipped.add(e);
                continue;
            }
        };

        tracing::debug!(file = %path.display(), blocks = raw_blocks.len(), "Added blocks");

        blocks.extend(
            raw_blocks
                .into_iter()
                .map(|raw| builder.new_block(raw, module_block, ctx)),
        );
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Syntax;
    use pretty_assertions::assert_eq;

    fn parsed(name: &str, content: &str) -> ParsedFile {
        ParsedFile {
            path: PathBuf::from("/project").join(name),
            syntax: Syntax::Native,
            body: hcl::parse(content).unwrap(),
        }
    }

    #[test]
    fn test_extract_rejects_top_level_attribute() {
        let err = extract_blocks(parsed("main.tf", "region = \"us-east-1\"")).unwrap_err();
        assert!(matches!(err, crate::error::TfResolveError::HclStructure { .. }));
    }

    #[test]
    fn test_extract_rejects_unknown_block_type() {
        assert!(extract_blocks(parsed("main.tf", "widget \"a\" {}")).is_err());
    }

    #[test]
    fn test_extract_rejects_wrong_label_count() {
        assert!(extract_blocks(parsed("main.tf", "resource \"aws_instance\" {}")).is_err());
    }

    #[test]
    fn test_construct_preserves_order_and_filename() {
        let files = vec![
            parsed("a.tf", "variable \"x\" {}\nvariable \"y\" {}"),
            parsed("b.tf", "resource \"aws_instance\" \"web\" {}"),
        ];
        let mut skipped = ErrorCollector::new();
        let blocks = construct_blocks(
            files,
            &DefaultBlockBuilder::default(),
            None,
            &BuildContext::root(Path::new("/project")),
            false,
            &mut skipped,
        )
        .unwrap();

        let addresses: Vec<_> = blocks.iter().map(Block::address).collect();
        assert_eq!(addresses, vec!["var.x", "var.y", "aws_instance.web"]);
        assert_eq!(blocks[2].filename, PathBuf::from("/project/b.tf"));
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_construct_skips_invalid_file_unless_strict() {
        let files = || {
            vec![
                parsed("a.tf", "region = \"us-east-1\""),
                parsed("b.tf", "variable \"x\" {}"),
            ]
        };
        let ctx = BuildContext::root(Path::new("/project"));
        let builder = DefaultBlockBuilder::default();

        let mut skipped = ErrorCollector::new();
        let blocks = construct_blocks(files(), &builder, None, &ctx, false, &mut skipped).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(skipped.count(), 1);

        let mut skipped = ErrorCollector::new();
        assert!(construct_blocks(files(), &builder, None, &ctx, true, &mut skipped).is_err());
    }

    #[test]
    fn test_uuid_is_stable_and_only_on_resources() {
        let build = || {
            let mut skipped = ErrorCollector::new();
            construct_blocks(
                vec![parsed("main.tf", "resource \"aws_instance\" \"web\" {}\nvariable \"x\" {}")],
                &DefaultBlockBuilder::default(),
                None,
                &BuildContext::root(Path::new("/project")),
                false,
                &mut skipped,
            )
            .unwrap()
        };
        let first = build();
        let second = build();

        assert!(first[0].values.get("uuid").is_some());
        assert_eq!(first[0].values.get("uuid"), second[0].values.get("uuid"));
        assert!(first[1].values.get("uuid").is_none());
    }

    #[test]
    fn test_module_block_sets_module_path() {
        let ctx = BuildContext::root(Path::new("/project"));
        let builder = DefaultBlockBuilder::new(Vec::new());
        let mut skipped = ErrorCollector::new();
        let call = construct_blocks(
            vec![parsed("main.tf", "module \"vpc\" { source = \"./vpc\" }")],
            &builder,
            None,
            &ctx,
            false,
            &mut skipped,
        )
        .unwrap()
        .remove(0);

        let child = construct_blocks(
            vec![parsed("vpc/main.tf", "resource \"aws_vpc\" \"this\" {}")],
            &builder,
            Some(&call),
            &ctx,
            false,
            &mut skipped,
        )
        .unwrap();

        assert_eq!(child[0].address(), "module.vpc.aws_vpc.this");
        assert!(child[0].values.is_empty());
    }

    #[test]
    fn test_custom_builder_is_used() {
        let mut builder = MockBlockBuilder::new();
        builder.expect_new_block().times(2).returning(|raw, _, _| Block {
            block_type: "custom".to_string(),
            labels: Vec::new(),
            body: raw.block.body,
            filename: raw.filename,
            module_path: Vec::new(),
            values: Map::new(),
        });

        let mut skipped = ErrorCollector::new();
        let blocks = construct_blocks(
            vec![parsed("main.tf", "variable \"x\" {}\nvariable \"y\" {}")],
            &builder,
            None,
            &BuildContext::root(Path::new("/project")),
            false,
            &mut skipped,
        )
        .unwrap();
        assert!(blocks.iter().all(|b| b.block_type == "custom"));
    }
}

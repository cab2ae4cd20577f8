// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in introspection tools

mod ast_digest;
mod find_usages;
mod grep;
mod jsx_props;
mod list_exports;
mod read_file;

pub use ast_digest::AstDigestTool;
pub use find_usages::FindUsagesTool;
pub use grep::GrepTool;
pub use jsx_props::InferJsxPropsTool;
pub use list_exports::ListExportsTool;
pub use read_file::ReadFileTool;

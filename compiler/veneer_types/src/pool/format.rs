//! Type formatting for diagnostics, logs and dumps.

use crate::ty::{GenericOwner, Ty};
use crate::TypePool;

impl TypePool {
    /// Format a type as a human-readable string.
    pub fn display(&self, ty: &Ty) -> String {
        let mut buf = String::new();
        self.display_into(ty, &mut buf);
        buf
    }

    /// Format a type into an existing buffer.
    pub fn display_into(&self, ty: &Ty, buf: &mut String) {
        match ty {
            Ty::Void => buf.push_str("void"),
            Ty::Bool => buf.push_str("bool"),
            Ty::Int32 => buf.push_str("int32"),
            Ty::Int64 => buf.push_str("int64"),
            Ty::Float64 => buf.push_str("float64"),
            Ty::String => buf.push_str("string"),
            Ty::Object => buf.push_str("object"),
            Ty::Named(def) => buf.push_str(self.name(self.def(*def).name)),
            Ty::Instance { def, args } => {
                buf.push_str(self.name(self.def(*def).name));
                buf.push('<');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        buf.push_str(", ");
                    }
                    self.display_into(arg, buf);
                }
                buf.push('>');
            }
            Ty::Array(elem) => {
                self.display_into(elem, buf);
                buf.push_str("[]");
            }
            Ty::ByRef(elem) => {
                self.display_into(elem, buf);
                buf.push('&');
            }
            Ty::Param(p) => match p.owner {
                GenericOwner::Method(_) | GenericOwner::Type(_) => {
                    match self.generic_param(*p) {
                        Some(def) => buf.push_str(self.name(def.name)),
                        None => buf.push_str("<unknown param>"),
                    }
                }
                GenericOwner::EmittedMethod => {
                    buf.push_str("!!");
                    buf.push_str(&p.index.to_string());
                }
                GenericOwner::EmittedType => {
                    buf.push('!');
                    buf.push_str(&p.index.to_string());
                }
            },
        }
    }
}

//! x86レジスタのレイアウト表
//!
//! サブレジスタは親レジスタの連続したビット範囲の別名です。
//! 例: `al` は `ax` の下位8ビット、`ax` は `eax` の下位16ビット、`eax` は `rax` の下位32ビット。

/// レジスタのレイアウト情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSpec {
    /// レジスタ名（小文字）
    pub name: &'static str,
    /// 親レジスタ名（最上位のレジスタはNone）
    pub parent: Option<&'static str>,
    /// 親レジスタ内でのビットオフセット
    pub offset: u32,
    /// ビット幅
    pub width: u32,
}

const fn full(name: &'static str, width: u32) -> RegisterSpec {
    RegisterSpec {
        name,
        parent: None,
        offset: 0,
        width,
    }
}

const fn sub(name: &'static str, parent: &'static str, offset: u32, width: u32) -> RegisterSpec {
    RegisterSpec {
        name,
        parent: Some(parent),
        offset,
        width,
    }
}

/// x86-64のレジスタ表
///
/// `pc` / `sp` / `fp` はGDBの汎用エイリアスで、親レジスタ全体を指します。
/// （GDBは`sp`を16ビットのサブレジスタとしては扱いません）
pub static X86_64: &[RegisterSpec] = &[
    full("rax", 64), sub("eax", "rax", 0, 32), sub("ax", "eax", 0, 16), sub("al", "ax", 0, 8), sub("ah", "ax", 8, 8),
    full("rbx", 64), sub("ebx", "rbx", 0, 32), sub("bx", "ebx", 0, 16), sub("bl", "bx", 0, 8), sub("bh", "bx", 8, 8),
    full("rcx", 64), sub("ecx", "rcx", 0, 32), sub("cx", "ecx", 0, 16), sub("cl", "cx", 0, 8), sub("ch", "cx", 8, 8),
    full("rdx", 64), sub("edx", "rdx", 0, 32), sub("dx", "edx", 0, 16), sub("dl", "dx", 0, 8), sub("dh", "dx", 8, 8),
    full("rsi", 64), sub("esi", "rsi", 0, 32), sub("si", "esi", 0, 16), sub("sil", "si", 0, 8),
    full("rdi", 64), sub("edi", "rdi", 0, 32), sub("di", "edi", 0, 16), sub("dil", "di", 0, 8),
    full("rbp", 64), sub("ebp", "rbp", 0, 32), sub("bp", "ebp", 0, 16), sub("bpl", "bp", 0, 8),
    full("rsp", 64), sub("esp", "rsp", 0, 32), sub("spl", "esp", 0, 8),
    full("r8", 64), sub("r8d", "r8", 0, 32), sub("r8w", "r8d", 0, 16), sub("r8l", "r8w", 0, 8),
    full("r9", 64), sub("r9d", "r9", 0, 32), sub("r9w", "r9d", 0, 16), sub("r9l", "r9w", 0, 8),
    full("r10", 64), sub("r10d", "r10", 0, 32), sub("r10w", "r10d", 0, 16), sub("r10l", "r10w", 0, 8),
    full("r11", 64), sub("r11d", "r11", 0, 32), sub("r11w", "r11d", 0, 16), sub("r11l", "r11w", 0, 8),
    full("r12", 64), sub("r12d", "r12", 0, 32), sub("r12w", "r12d", 0, 16), sub("r12l", "r12w", 0, 8),
    full("r13", 64), sub("r13d", "r13", 0, 32), sub("r13w", "r13d", 0, 16), sub("r13l", "r13w", 0, 8),
    full("r14", 64), sub("r14d", "r14", 0, 32), sub("r14w", "r14d", 0, 16), sub("r14l", "r14w", 0, 8),
    full("r15", 64), sub("r15d", "r15", 0, 32), sub("r15w", "r15d", 0, 16), sub("r15l", "r15w", 0, 8),
    full("rip", 64), sub("pc", "rip", 0, 64),
    sub("sp", "rsp", 0, 64), sub("fp", "rbp", 0, 64),
    full("eflags", 32),
    full("cs", 32), full("ss", 32), full("ds", 32), full("es", 32), full("fs", 32), full("gs", 32),
    full("fs_base", 64), full("gs_base", 64),
];

/// 表に含まれるトップレベルのレジスタ（`info registers` の表示順）
pub fn general_registers() -> impl Iterator<Item = &'static RegisterSpec> {
    X86_64.iter().filter(|spec| spec.parent.is_none())
}

/// レジスタ名からレイアウトを引く（大文字小文字を区別しない、先頭の`$`は無視）
pub fn lookup(name: &str) -> Option<&'static RegisterSpec> {
    let name = name.trim().trim_start_matches('$');
    X86_64.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))
}

impl RegisterSpec {
    /// 最上位の親レジスタを取得する
    pub fn root(&'static self) -> &'static RegisterSpec {
        let mut current = self;
        while let Some(parent) = current.parent.and_then(lookup) {
            current = parent;
        }
        current
    }

    /// 最上位の親レジスタ内でのビットオフセット
    pub fn root_offset(&self) -> u32 {
        let mut offset = self.offset;
        let mut current = self.parent.and_then(lookup);
        while let Some(spec) = current {
            offset += spec.offset;
            current = spec.parent.and_then(lookup);
        }
        offset
    }

    /// 幅に応じたビットマスク（オフセット適用前）
    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// 親レジスタ全体の値からこのレジスタの値を取り出す
    pub fn extract(&self, root_value: u64) -> u64 {
        (root_value >> self.root_offset()) & self.mask()
    }

    /// このレジスタに`value`を書き込んだ後の親レジスタ全体の値を計算する
    ///
    /// 対象のビット範囲以外はそのまま残ります。
    pub fn compose(&self, root_value: u64, value: u64) -> u64 {
        let shift = self.root_offset();
        let mask = self.mask() << shift;
        (root_value & !mask) | ((value & self.mask()) << shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(lookup("eax"), lookup("EAX"));
        assert_eq!(lookup("$Eax").map(|s| s.name), Some("eax"));
        assert!(lookup("xyz").is_none());
    }

    #[test]
    fn test_root_and_offset() {
        let ah = lookup("ah").unwrap();
        assert_eq!(ah.root().name, "rax");
        assert_eq!(ah.root_offset(), 8);

        let r10l = lookup("r10l").unwrap();
        assert_eq!(r10l.root().name, "r10");
        assert_eq!(r10l.root_offset(), 0);

        assert_eq!(lookup("rax").unwrap().root().name, "rax");
        assert_eq!(lookup("pc").unwrap().root().name, "rip");
    }

    #[test]
    fn test_extract() {
        let rax = 0x1122_3344_5566_7788;
        assert_eq!(lookup("eax").unwrap().extract(rax), 0x5566_7788);
        assert_eq!(lookup("ax").unwrap().extract(rax), 0x7788);
        assert_eq!(lookup("al").unwrap().extract(rax), 0x88);
        assert_eq!(lookup("ah").unwrap().extract(rax), 0x77);
        assert_eq!(lookup("rax").unwrap().extract(rax), rax);
    }

    #[test]
    fn test_compose_low_byte_keeps_other_bits() {
        let al = lookup("al").unwrap();
        for old in [0u64, 1337, 0xffff_ffff, 0xdead_beef_cafe_babe] {
            for byte in [0u64, 13, 0xff] {
                let new = al.compose(old, byte);
                assert_eq!(new, (old & !0xff) | byte);
                assert_eq!(lookup("eax").unwrap().extract(new), (old & 0xffff_ff00) | byte);
            }
        }
    }

    #[test]
    fn test_compose_high_byte() {
        let ah = lookup("ah").unwrap();
        assert_eq!(ah.compose(0x1234, 0xab), 0xab34);
        // 幅を超える値は切り捨てられる
        assert_eq!(ah.compose(0, 0x1ff), 0xff00);
    }

    #[test]
    fn test_general_registers_order() {
        let names: Vec<_> = general_registers().map(|s| s.name).take(3).collect();
        assert_eq!(names, vec!["rax", "rbx", "rcx"]);
    }
}

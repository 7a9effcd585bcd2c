//! GLSL sources for every pass.
//!
//! Fragment shaders are stored without a preamble. [`fragment_source`] glues
//! together the version directive, the keyword defines, the shared
//! [`HEADER`] and the pass body, in that order.

use crate::program::{KeywordSet, Material};

/// Produces the complete fragment shader for `material` with `keywords` enabled.
pub fn fragment_source(material: Material, keywords: &KeywordSet) -> String {
    wrap_fragment(fragment_body(material), keywords)
}

/// Injects `#define` lines right after the `#version` directive of `body`,
/// followed by the shared header. A missing directive gets `#version 450`.
pub fn wrap_fragment(body: &str, keywords: &KeywordSet) -> String {
    let mut version = "#version 450";
    let mut rest = Vec::new();
    let mut found_version = false;
    for line in body.lines() {
        if !found_version && line.trim_start().starts_with("#version") {
            version = line.trim();
            found_version = true;
            continue;
        }
        rest.push(line);
    }

    let mut wrapped = String::with_capacity(HEADER.len() + body.len() + 64);
    wrapped.push_str(version);
    wrapped.push('\n');
    wrapped.push_str(&keywords.defines());
    wrapped.push_str(HEADER);
    for line in rest {
        wrapped.push_str(line);
        wrapped.push('\n');
    }
    wrapped
}

pub fn fragment_body(material: Material) -> &'static str {
    match material {
        Material::Clear => CLEAR,
        Material::Splat => SPLAT,
        Material::Advection => ADVECTION,
        Material::Curl => CURL,
        Material::Vorticity => VORTICITY,
        Material::Divergence => DIVERGENCE,
        Material::Pressure => PRESSURE,
        Material::GradientSubtract => GRADIENT_SUBTRACT,
        Material::Display => DISPLAY,
    }
}

/// Full-screen triangle. Also computes the four neighbour coordinates used
/// by the finite-difference passes.
pub const VERTEX_SHADER: &str = r"#version 450
layout(location = 0) out vec2 v_uv;
layout(location = 1) out vec2 v_l;
layout(location = 2) out vec2 v_r;
layout(location = 3) out vec2 v_t;
layout(location = 4) out vec2 v_b;

layout(std140, set = 0, binding = 0) uniform PassParams {
    vec2 texel_size;
    float dt;
    float dissipation;
    vec2 point;
    float aspect_ratio;
    float radius;
    vec4 color;
    float curl;
    float value;
    vec2 padding;
} params;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    // Row 0 of every texture is the top of the target.
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    v_l = v_uv - vec2(params.texel_size.x, 0.0);
    v_r = v_uv + vec2(params.texel_size.x, 0.0);
    v_t = v_uv + vec2(0.0, params.texel_size.y);
    v_b = v_uv - vec2(0.0, params.texel_size.y);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Shared fragment prologue. The uniform block must match `PassUniforms`.
pub const HEADER: &str = r"
layout(location = 0) in vec2 v_uv;
layout(location = 1) in vec2 v_l;
layout(location = 2) in vec2 v_r;
layout(location = 3) in vec2 v_t;
layout(location = 4) in vec2 v_b;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform PassParams {
    vec2 texel_size;
    float dt;
    float dissipation;
    vec2 point;
    float aspect_ratio;
    float radius;
    vec4 color;
    float curl;
    float value;
    vec2 padding;
} params;

layout(set = 1, binding = 0) uniform texture2D slot0_texture;
layout(set = 1, binding = 1) uniform sampler slot0_sampler;
layout(set = 1, binding = 2) uniform texture2D slot1_texture;
layout(set = 1, binding = 3) uniform sampler slot1_sampler;

#define SLOT0 sampler2D(slot0_texture, slot0_sampler)
#define SLOT1 sampler2D(slot1_texture, slot1_sampler)
";

const CLEAR: &str = r"
void main() {
    out_color = params.value * texture(SLOT0, v_uv);
}
";

const SPLAT: &str = r"
void main() {
    vec2 p = v_uv - params.point;
    p.x *= params.aspect_ratio;
    vec3 splat = exp(-dot(p, p) / params.radius) * params.color.rgb;
    vec3 base = texture(SLOT0, v_uv).xyz;
    out_color = vec4(base + splat, 1.0);
}
";

const ADVECTION: &str = r"
void main() {
    vec2 coord = v_uv - params.dt * texture(SLOT0, v_uv).xy * params.texel_size;
    vec4 result = texture(SLOT1, coord);
    float decay = 1.0 + params.dissipation * params.dt;
    out_color = result / decay;
}
";

const CURL: &str = r"
void main() {
    float L = texture(SLOT0, v_l).y;
    float R = texture(SLOT0, v_r).y;
    float T = texture(SLOT0, v_t).x;
    float B = texture(SLOT0, v_b).x;
    float vorticity = R - L - T + B;
    out_color = vec4(0.5 * vorticity, 0.0, 0.0, 1.0);
}
";

const VORTICITY: &str = r"
void main() {
    float L = texture(SLOT1, v_l).x;
    float R = texture(SLOT1, v_r).x;
    float T = texture(SLOT1, v_t).x;
    float B = texture(SLOT1, v_b).x;
    float C = texture(SLOT1, v_uv).x;

    vec2 force = 0.5 * vec2(abs(T) - abs(B), abs(R) - abs(L));
    force /= length(force) + 0.0001;
    force *= params.curl * C;
    force.y *= -1.0;

    vec2 velocity = texture(SLOT0, v_uv).xy;
    velocity += force * params.dt;
    out_color = vec4(velocity, 0.0, 1.0);
}
";

const DIVERGENCE: &str = r"
void main() {
    float L = texture(SLOT0, v_l).x;
    float R = texture(SLOT0, v_r).x;
    float T = texture(SLOT0, v_t).y;
    float B = texture(SLOT0, v_b).y;

    vec2 C = texture(SLOT0, v_uv).xy;
    if (v_l.x < 0.0) { L = -C.x; }
    if (v_r.x > 1.0) { R = -C.x; }
    if (v_t.y > 1.0) { T = -C.y; }
    if (v_b.y < 0.0) { B = -C.y; }

    float div = 0.5 * (R - L + T - B);
    out_color = vec4(div, 0.0, 0.0, 1.0);
}
";

const PRESSURE: &str = r"
void main() {
    float L = texture(SLOT0, v_l).x;
    float R = texture(SLOT0, v_r).x;
    float T = texture(SLOT0, v_t).x;
    float B = texture(SLOT0, v_b).x;
    float divergence = texture(SLOT1, v_uv).x;
    float pressure = (L + R + B + T - divergence) * 0.25;
    out_color = vec4(pressure, 0.0, 0.0, 1.0);
}
";

const GRADIENT_SUBTRACT: &str = r"
void main() {
    float L = texture(SLOT0, v_l).x;
    float R = texture(SLOT0, v_r).x;
    float T = texture(SLOT0, v_t).x;
    float B = texture(SLOT0, v_b).x;
    vec2 velocity = texture(SLOT1, v_uv).xy;
    velocity -= 0.5 * vec2(R - L, T - B);
    out_color = vec4(velocity, 0.0, 1.0);
}
";

const DISPLAY: &str = r"
void main() {
    vec3 c = texture(SLOT0, v_uv).rgb;
#ifdef SHADING
    vec3 lc = texture(SLOT0, v_l).rgb;
    vec3 rc = texture(SLOT0, v_r).rgb;
    vec3 tc = texture(SLOT0, v_t).rgb;
    vec3 bc = texture(SLOT0, v_b).rgb;

    float dx = length(rc) - length(lc);
    float dy = length(tc) - length(bc);
    vec3 n = normalize(vec3(dx, dy, length(params.texel_size)));
    vec3 l = vec3(0.0, 0.0, 1.0);
    float diffuse = clamp(dot(n, l) + 0.7, 0.7, 1.0);
    c *= diffuse;
#endif
    float a = max(c.r, max(c.g, c.b));
    out_color = vec4(c, a);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::SHADING;

    #[test]
    fn defines_follow_the_version_directive() {
        let keywords = KeywordSet::new().with(SHADING);
        let source = fragment_source(Material::Display, &keywords);
        let mut lines = source.lines();
        assert_eq!(lines.next(), Some("#version 450"));
        assert_eq!(lines.next(), Some("#define SHADING"));
        assert!(source.contains("#ifdef SHADING"));
    }

    #[test]
    fn plain_variants_have_no_defines() {
        let source = fragment_source(Material::Advection, &KeywordSet::new());
        assert!(!source.contains("#define SHADING"));
        assert!(source.contains("uniform PassParams"));
        assert!(source.contains("out_color = result / decay"));
    }

    #[test]
    fn explicit_version_is_preserved() {
        let body = "#version 460\nvoid main() {}\n";
        let wrapped = wrap_fragment(body, &KeywordSet::new().with("FOO"));
        assert!(wrapped.starts_with("#version 460\n#define FOO\n"));
        assert_eq!(wrapped.matches("#version").count(), 1);
    }

    #[test]
    fn every_material_has_a_main() {
        for material in Material::ALL {
            assert!(fragment_body(material).contains("void main()"));
        }
    }
}
